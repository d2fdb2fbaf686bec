use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Enhance,
    Brainstorm,
    Generate,
    AnalyzeImage,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Enhance,
        Operation::Brainstorm,
        Operation::Generate,
        Operation::AnalyzeImage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Enhance => "enhance",
            Operation::Brainstorm => "brainstorm",
            Operation::Generate => "generate",
            Operation::AnalyzeImage => "analyze_image",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusyFlags {
    pub enhance: bool,
    pub brainstorm: bool,
    pub generate: bool,
    pub analyze_image: bool,
}

impl BusyFlags {
    pub fn get(&self, operation: Operation) -> bool {
        match operation {
            Operation::Enhance => self.enhance,
            Operation::Brainstorm => self.brainstorm,
            Operation::Generate => self.generate,
            Operation::AnalyzeImage => self.analyze_image,
        }
    }

    pub fn set(&mut self, operation: Operation, busy: bool) {
        match operation {
            Operation::Enhance => self.enhance = busy,
            Operation::Brainstorm => self.brainstorm = busy,
            Operation::Generate => self.generate = busy,
            Operation::AnalyzeImage => self.analyze_image = busy,
        }
    }

    pub fn any(&self) -> bool {
        Operation::ALL.iter().any(|operation| self.get(*operation))
    }

    pub fn active(&self) -> Vec<Operation> {
        Operation::ALL
            .iter()
            .copied()
            .filter(|operation| self.get(*operation))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePreview {
    pub data_url: String,
    pub mime_type: String,
    pub file_name: Option<String>,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub scene: String,
    pub action: String,
    pub output: String,
    pub image_preview: Option<ImagePreview>,
    pub busy: BusyFlags,
    pub input_error: bool,
    pub copy_confirmed: bool,
}

impl SessionState {
    pub fn is_initial(&self) -> bool {
        *self == SessionState::default()
    }

    pub fn output_chars(&self) -> usize {
        self.output.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_flags_toggle_per_operation() {
        let mut flags = BusyFlags::default();
        assert!(!flags.any());
        flags.set(Operation::AnalyzeImage, true);
        assert!(flags.get(Operation::AnalyzeImage));
        assert!(!flags.get(Operation::Generate));
        assert_eq!(flags.active(), vec![Operation::AnalyzeImage]);
        flags.set(Operation::AnalyzeImage, false);
        assert!(!flags.any());
    }

    #[test]
    fn default_state_is_initial() {
        let mut state = SessionState::default();
        assert!(state.is_initial());
        state.scene.push_str("rain");
        assert!(!state.is_initial());
    }

    #[test]
    fn output_length_counts_characters() {
        let state = SessionState {
            output: "1–9".to_string(),
            ..SessionState::default()
        };
        assert_eq!(state.output_chars(), 3);
    }
}
