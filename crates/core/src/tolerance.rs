use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Named deviation budget. Each preset pairs the numeric limit used by the
/// scorer with the guideline sentence given to the generation model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TolerancePreset {
    Strict,
    #[default]
    Minimal,
    Moderate,
    Flexible,
}

impl TolerancePreset {
    pub const ALL: [TolerancePreset; 4] =
        [Self::Strict, Self::Minimal, Self::Moderate, Self::Flexible];

    /// Maximum acceptable deviation percentage for this preset.
    pub fn limit(&self) -> f64 {
        match self {
            Self::Strict => 10.0,
            Self::Minimal => 25.0,
            Self::Moderate => 50.0,
            Self::Flexible => 70.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::Flexible => "flexible",
        }
    }

    /// Deviation guideline embedded in the generation prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Strict => {
                "Follow the standard response EXACTLY. Make only the minimal changes necessary \
                 to address the specific customer inquiry. Deviation should be less than 10%."
            }
            Self::Minimal => {
                "Follow the standard response closely but allow minor modifications to better \
                 address the customer inquiry. Deviation should be less than 25%."
            }
            Self::Moderate => {
                "Use the standard response as a strong guideline but allow moderate changes to \
                 personalize and improve the response. Deviation should be less than 50%."
            }
            Self::Flexible => {
                "Use the standard response as a foundation but feel free to significantly modify \
                 it to create the best possible response. Deviation can be up to 70%."
            }
        }
    }
}

impl std::str::FromStr for TolerancePreset {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "minimal" => Ok(Self::Minimal),
            "moderate" => Ok(Self::Moderate),
            "flexible" => Ok(Self::Flexible),
            other => Err(ConfigError::Validation(format!(
                "unsupported tolerance preset `{other}` (expected strict|minimal|moderate|flexible)"
            ))),
        }
    }
}

impl std::fmt::Display for TolerancePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
