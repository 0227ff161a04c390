use crate::features::files::models::{DriveFile, SEVERITY_OPTIONS};
use crate::modules::google::SurveyQuestion;

/// Title of every severity survey
pub const SURVEY_TITLE: &str = "Uso de archivos compartidos";

/// Checkbox question asking how sensitive one file is
pub fn question_for_file(file: &DriveFile) -> SurveyQuestion {
    SurveyQuestion {
        title: format!("El archivo {} -> {}", file.name, file.url),
        options: SEVERITY_OPTIONS
            .iter()
            .map(|(option, _)| option.to_string())
            .collect(),
    }
}
