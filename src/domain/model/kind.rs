//! Known model types

use std::fmt;
use std::str::FromStr;

use crate::domain::DomainError;

/// How a model produces results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Scores a supplied candidate list, one score per item
    Ranking,
    /// Produces its own candidates with scores
    Retrieval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Fm,
    DeepFm,
    WideDeep,
    Dssm,
    YoutubeDnn,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Fm,
        ModelKind::DeepFm,
        ModelKind::WideDeep,
        ModelKind::Dssm,
        ModelKind::YoutubeDnn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fm => "fm",
            Self::DeepFm => "deepfm",
            Self::WideDeep => "wide_deep",
            Self::Dssm => "dssm",
            Self::YoutubeDnn => "youtube_dnn",
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Self::Fm | Self::DeepFm | Self::WideDeep => ModelFamily::Ranking,
            Self::Dssm | Self::YoutubeDnn => ModelFamily::Retrieval,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();

        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| DomainError::configuration(format!("Unknown model '{}'", s)))
    }
}
