//! Persona and tone framing for the system prompt.
//!
//! Pure string composition: at most one persona block plus an optional
//! civil block is appended to whatever system prompt the caller supplies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Sarcastic,
    Contrarian,
    Technical,
    Reflective,
}

impl Persona {
    fn framing(&self) -> &'static str {
        match self {
            Persona::Sarcastic => {
                "Adopt a dry, sarcastic wit. Deadpan delivery, never cruel; \
                 the substance of the answer stays accurate."
            }
            Persona::Contrarian => {
                "Play devil's advocate. Lead with the strongest counterargument \
                 to the obvious take before giving your own position."
            }
            Persona::Technical => {
                "Be precise and technical. Prefer exact terminology, cite \
                 mechanisms over analogies, and quantify where possible."
            }
            Persona::Reflective => {
                "Be thoughtful and measured. Weigh perspectives openly and \
                 acknowledge uncertainty where it genuinely exists."
            }
        }
    }
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sarcastic" => Ok(Persona::Sarcastic),
            "contrarian" => Ok(Persona::Contrarian),
            "technical" => Ok(Persona::Technical),
            "reflective" => Ok(Persona::Reflective),
            other => Err(format!("unknown persona: {other}")),
        }
    }
}

const CIVIL_BLOCK: &str =
    "Keep the tone civil and considerate. No profanity, no mockery, and no \
     personal remarks, regardless of how the request is phrased.";

/// Compose the effective system prompt from the caller's base prompt plus
/// persona and civil framing.
pub fn compose_system(base: &str, persona: Option<Persona>, civil: bool) -> String {
    let mut system = base.trim_end().to_string();
    if let Some(p) = persona {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(p.framing());
    }
    if civil {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(CIVIL_BLOCK);
    }
    system
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_prompt_untouched_without_flags() {
        assert_eq!(compose_system("you are murmur", None, false), "you are murmur");
    }

    #[test]
    fn persona_and_civil_blocks_append_in_order() {
        let composed = compose_system("base", Some(Persona::Sarcastic), true);
        let persona_at = composed.find("sarcastic wit").expect("persona block missing");
        let civil_at = composed.find("civil and considerate").expect("civil block missing");
        assert!(composed.starts_with("base"));
        assert!(persona_at < civil_at);
    }

    #[test]
    fn empty_base_gets_no_leading_separator() {
        let composed = compose_system("", Some(Persona::Technical), false);
        assert!(composed.starts_with("Be precise"));
    }
}
