use std::fmt;
use std::str::FromStr;

use crate::domain::errors::RunError;

/// Symbolic music encoding formats the corpus ships encoded files in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notation {
    Mei,
    MusicXml,
    Abc,
    Humdrum,
}

impl Notation {
    pub const ALL: [Notation; 4] = [
        Notation::Mei,
        Notation::MusicXml,
        Notation::Abc,
        Notation::Humdrum,
    ];

    /// Canonical lowercase name, used for directory names and output file
    /// naming.
    pub fn name(self) -> &'static str {
        match self {
            Notation::Mei => "mei",
            Notation::MusicXml => "musicxml",
            Notation::Abc => "abc",
            Notation::Humdrum => "humdrum",
        }
    }

    /// File extension for encoded files in this notation, dot included.
    pub fn extension(self) -> &'static str {
        match self {
            Notation::Mei => ".mei",
            Notation::MusicXml => ".musicxml",
            Notation::Abc => ".abc",
            Notation::Humdrum => ".krn",
        }
    }

    pub fn parse(value: &str) -> Result<Self, RunError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mei" => Ok(Notation::Mei),
            "musicxml" => Ok(Notation::MusicXml),
            "abc" => Ok(Notation::Abc),
            // "humdrun" is a misspelling that survives in older run scripts.
            "humdrum" | "humdrun" => Ok(Notation::Humdrum),
            other => Err(RunError::config(format!(
                "unknown notation '{other}'; supported: mei, musicxml, abc, humdrum"
            ))),
        }
    }
}

impl FromStr for Notation {
    type Err = RunError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Notation::parse(value)
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully assembled provider request. Construction validates the sampling
/// parameters so adapters can trust the payload they serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub system_text: String,
    pub user_text: String,
    pub temperature: f32,
    pub model_override: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl PromptRequest {
    pub fn new(
        system_text: impl Into<String>,
        user_text: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, RunError> {
        validate_temperature(temperature)?;
        Ok(Self {
            system_text: system_text.into(),
            user_text: user_text.into(),
            temperature,
            model_override: None,
            max_output_tokens: None,
        })
    }

    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

fn validate_temperature(temperature: f32) -> Result<(), RunError> {
    if !temperature.is_finite() {
        return Err(RunError::validation(
            "temperature must be a finite number".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&temperature) {
        return Err(RunError::validation(format!(
            "temperature {temperature} is outside the accepted range 0.0..=1.0"
        )));
    }
    Ok(())
}
