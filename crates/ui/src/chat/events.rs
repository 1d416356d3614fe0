/// Emitted when the student submits a question from the input box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

/// Emitted when the credential form is submitted with a non-blank key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSubmitted {
    pub credential: String,
}

impl Submit {
    /// Keeps the question exactly as typed; only an all-blank input is dropped.
    pub fn from_input(input: &str) -> Option<Self> {
        if input.trim().is_empty() {
            return None;
        }

        Some(Self {
            content: input.to_string(),
        })
    }
}

impl CredentialSubmitted {
    /// Returns `None` for blank input so the form never emits an empty key.
    pub fn from_input(input: &str) -> Option<Self> {
        let credential = input.trim();
        if credential.is_empty() {
            return None;
        }

        Some(Self {
            credential: credential.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_input_is_trimmed_and_blank_is_rejected() {
        assert_eq!(
            CredentialSubmitted::from_input("  AIza-key \n"),
            Some(CredentialSubmitted {
                credential: "AIza-key".to_string()
            })
        );
        assert_eq!(CredentialSubmitted::from_input(" \t "), None);
    }

    #[test]
    fn question_is_sent_as_typed_and_blank_is_rejected() {
        assert_eq!(
            Submit::from_input("  ¿Qué es la recta de Euler?\n  con detalle "),
            Some(Submit {
                content: "  ¿Qué es la recta de Euler?\n  con detalle ".to_string()
            })
        );
        assert_eq!(Submit::from_input(" \n "), None);
    }
}
