use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    #[serde(alias = "user")]
    Prospect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

impl Sentiment {
    pub fn score(self) -> f64 {
        match self {
            Sentiment::VeryPositive => 1.0,
            Sentiment::Positive => 0.5,
            Sentiment::Neutral => 0.0,
            Sentiment::Negative => -0.5,
            Sentiment::VeryNegative => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::VeryPositive => "very_positive",
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::VeryNegative => "very_negative",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentReading {
    pub sentiment: Sentiment,
    pub score: f64,
    pub indicators: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of one call. Consumed when the session is flushed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallTranscript {
    turns: Vec<Turn>,
    sentiments: Vec<SentimentReading>,
}

impl CallTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.turns.push(Turn {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_sentiment(&mut self, sentiment: Sentiment, indicators: impl Into<String>) {
        self.sentiments.push(SentimentReading {
            sentiment,
            score: sentiment.score(),
            indicators: indicators.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn sentiments(&self) -> &[SentimentReading] {
        &self.sentiments
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.sentiments.is_empty()
    }

    /// Mean of all sentiment scores, or `None` if none were recorded.
    pub fn average_sentiment(&self) -> Option<f64> {
        if self.sentiments.is_empty() {
            return None;
        }
        let total: f64 = self.sentiments.iter().map(|s| s.score).sum();
        Some(total / self.sentiments.len() as f64)
    }

    /// Plain `speaker: text` lines, in order.
    pub fn to_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let who = match t.speaker {
                    Speaker::Agent => "agent",
                    Speaker::Prospect => "prospect",
                };
                format!("{who}: {}", t.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
