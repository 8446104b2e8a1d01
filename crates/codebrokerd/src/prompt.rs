//! Prompt composition for the five code-assistance actions.
//!
//! Pure and deterministic: the same inputs always yield the same text.
//! Code bodies are fenced with ``` so backends can tell code from
//! instructions.

use codebroker_common::{Action, PersonaId};
use serde_json::Value;
use std::collections::HashMap;

/// Option key carrying the translation target
pub const TARGET_LANGUAGE_OPTION: &str = "targetLanguage";

/// Option key carrying the compiler/runtime error for `fix_error`
pub const ERROR_OPTION: &str = "error";

const DEFAULT_TARGET_LANGUAGE: &str = "python";

/// Build the final prompt for a recognized action
pub fn compose(
    action: Action,
    content: &str,
    persona: PersonaId,
    options: &HashMap<String, Value>,
) -> String {
    let system_prompt = persona.profile().system_prompt;

    let body = match action {
        Action::Explain => format!(
            "Please explain the following code:\n\n{}\n\nExplain what this code does, how it works, and any important concepts involved.",
            fenced(content)
        ),
        Action::Translate => {
            let target = option_str(options, TARGET_LANGUAGE_OPTION).unwrap_or(DEFAULT_TARGET_LANGUAGE);
            format!(
                "Please translate the following code to {}:\n\n{}\n\nProvide the translated code and explain any important differences or considerations.",
                target,
                fenced(content)
            )
        }
        Action::Optimize => format!(
            "Please optimize the following code for better performance, readability, and maintainability:\n\n{}\n\nProvide the optimized version and explain what improvements were made.",
            fenced(content)
        ),
        Action::Chat => format!(
            "User message: {}\n\nPlease respond helpfully as a programming assistant.",
            content
        ),
        Action::FixError => {
            let error = option_str(options, ERROR_OPTION).unwrap_or("");
            format!(
                "The following code is producing an error:\n\nCode:\n{}\n\nError message:\n{}\n\nPlease analyze the error, explain what's wrong, and provide a corrected version of the code.",
                fenced(content),
                fenced(error)
            )
        }
    };

    format!("{}\n\n{}\n", system_prompt, body)
}

/// Only string option values are used; anything else counts as absent
fn option_str<'a>(options: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

fn fenced(text: &str) -> String {
    format!("```\n{}\n```", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_options() -> HashMap<String, Value> {
        HashMap::new()
    }

    #[test]
    fn test_compose_is_deterministic() {
        let mut options = HashMap::new();
        options.insert(TARGET_LANGUAGE_OPTION.to_string(), Value::from("Rust"));
        options.insert(ERROR_OPTION.to_string(), Value::from("NameError"));

        for action in Action::ALL {
            for persona in PersonaId::ALL {
                let a = compose(action, "x = 1", persona, &options);
                let b = compose(action, "x = 1", persona, &options);
                assert_eq!(a, b, "{} / {} not deterministic", action, persona);
                assert!(a.starts_with(persona.profile().system_prompt));
            }
        }
    }

    #[test]
    fn test_explain_snapshot() {
        let prompt = compose(Action::Explain, "print('hi')", PersonaId::Hacker, &no_options());
        let expected = format!(
            "{}\n\nPlease explain the following code:\n\n```\nprint('hi')\n```\n\nExplain what this code does, how it works, and any important concepts involved.\n",
            PersonaId::Hacker.profile().system_prompt
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_translate_uses_target_language() {
        let mut options = HashMap::new();
        options.insert(TARGET_LANGUAGE_OPTION.to_string(), Value::from("Go"));
        let prompt = compose(Action::Translate, "def f(): pass", PersonaId::Teacher, &options);
        assert!(prompt.contains("translate the following code to Go:"));
        assert!(prompt.contains("```\ndef f(): pass\n```"));
    }

    #[test]
    fn test_translate_defaults_to_python() {
        let prompt = compose(Action::Translate, "int x;", PersonaId::Teacher, &no_options());
        assert!(prompt.contains("to python:"));
    }

    #[test]
    fn test_fix_error_fences_code_and_error() {
        let mut options = HashMap::new();
        options.insert(ERROR_OPTION.to_string(), Value::from("ZeroDivisionError"));
        let prompt = compose(Action::FixError, "1/0", PersonaId::Reviewer, &options);
        assert!(prompt.contains("Code:\n```\n1/0\n```"));
        assert!(prompt.contains("Error message:\n```\nZeroDivisionError\n```"));
    }

    #[test]
    fn test_fix_error_without_error_option() {
        let prompt = compose(Action::FixError, "1/0", PersonaId::Reviewer, &no_options());
        assert!(prompt.contains("Error message:\n```\n\n```"));
    }

    #[test]
    fn test_non_string_options_fall_back_to_defaults() {
        let mut options = HashMap::new();
        options.insert(TARGET_LANGUAGE_OPTION.to_string(), Value::from(4));
        options.insert(ERROR_OPTION.to_string(), Value::Null);

        let prompt = compose(Action::Translate, "int x;", PersonaId::Teacher, &options);
        assert!(prompt.contains("to python:"));
        let prompt = compose(Action::FixError, "1/0", PersonaId::Teacher, &options);
        assert!(prompt.contains("Error message:\n```\n\n```"));
    }

    #[test]
    fn test_chat_is_not_fenced() {
        let prompt = compose(Action::Chat, "what is a closure?", PersonaId::Teacher, &no_options());
        assert!(prompt.contains("User message: what is a closure?"));
        assert!(!prompt.contains("```"));
    }
}
