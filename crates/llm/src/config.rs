/// Gemini model used for every tutor session.
pub const GEOMENTOR_MODEL: &str = "gemini-2.5-flash";
/// Sampling temperature for tutor replies.
pub const GEOMENTOR_TEMPERATURE: f64 = 0.5;
/// Nucleus-sampling cutoff for tutor replies.
pub const GEOMENTOR_TOP_P: f64 = 0.9;
/// Persona and pedagogy instructions handed to the provider as the system preamble.
pub const GEOMENTOR_SYSTEM_INSTRUCTION: &str = include_str!("prompts/geomentor.md");

/// Immutable configuration bound to a session at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorConfig {
    pub system_instruction: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
}

impl TutorConfig {
    /// The fixed GeoMentor configuration.
    pub fn geomentor() -> Self {
        Self {
            system_instruction: GEOMENTOR_SYSTEM_INSTRUCTION.to_string(),
            model: GEOMENTOR_MODEL.to_string(),
            temperature: GEOMENTOR_TEMPERATURE,
            top_p: GEOMENTOR_TOP_P,
        }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self::geomentor()
    }
}
