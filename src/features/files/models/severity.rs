use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Sensitivity level of a file, ordered from least to most sensitive
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, Type,
)]
#[sqlx(type_name = "file_severity")]
pub enum Severity {
    #[default]
    #[sqlx(rename = "Desconocido")]
    #[serde(rename = "Desconocido")]
    Unknown,
    #[sqlx(rename = "Bajo")]
    #[serde(rename = "Bajo")]
    Low,
    #[sqlx(rename = "Medio")]
    #[serde(rename = "Medio")]
    Medium,
    #[sqlx(rename = "Alto")]
    #[serde(rename = "Alto")]
    High,
    #[sqlx(rename = "Critico")]
    #[serde(rename = "Critico")]
    Critical,
}

/// Checkbox options offered for every file, with the weight each one carries
pub const SEVERITY_OPTIONS: [(&str, u8); 5] = [
    ("está relacionado con procesos legales o confidenciales?", 4),
    ("es necesario para la operación diaria de la empresa?", 3),
    ("se comparte con partes externas a la organización?", 2),
    ("está en uso activo en proyectos actuales?", 2),
    ("contiene información de uso común y conocida?", 1),
];

/// Severities whose public files must be remediated
pub const FLAGGED_SEVERITIES: [Severity; 2] = [Severity::Critical, Severity::High];

impl Severity {
    pub fn from_weight(weight: u8) -> Self {
        match weight {
            0 => Severity::Unknown,
            1 => Severity::Low,
            2 => Severity::Medium,
            3 => Severity::High,
            _ => Severity::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Unknown => "Desconocido",
            Severity::Low => "Bajo",
            Severity::Medium => "Medio",
            Severity::High => "Alto",
            Severity::Critical => "Critico",
        }
    }

    /// Classify a file from the options ticked in its survey item.
    ///
    /// The highest weighted recognized option wins. Unrecognized options are ignored and
    /// an answer with no recognized option is `Unknown`.
    pub fn classify<'a, I>(answers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let weight = answers
            .into_iter()
            .filter_map(option_weight)
            .max()
            .unwrap_or(0);

        Self::from_weight(weight)
    }
}

fn option_weight(answer: &str) -> Option<u8> {
    SEVERITY_OPTIONS
        .iter()
        .find(|(option, _)| *option == answer)
        .map(|(_, weight)| *weight)
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
