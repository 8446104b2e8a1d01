//! Static guidance returned when no generation backend can answer.

/// Canned guidance categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCategory {
    Explain,
    Translate,
    Optimize,
    General,
}

const EXPLAIN_TEXT: &str = "I'm sorry, but I don't have access to AI services right now.

To enable AI features:
1. For online mode: Set OPENAI_API_KEY or GROQ_API_KEY environment variable
2. For offline mode: Place a GGML/GGUF model file in the models/ directory and ensure llama.cpp is available

In the meantime, I can help you with basic code operations through the file explorer and editor.";

const TRANSLATE_TEXT: &str = "I can't translate code without AI services, but here are some general tips:

- Python to JavaScript: Focus on syntax differences (indentation vs braces, def vs function)
- JavaScript to Python: Watch out for variable scoping and type differences
- Java to Python: Consider Python's dynamic typing and simpler syntax

Please set up AI services for full translation capabilities.";

const OPTIMIZE_TEXT: &str = "Without AI services, here are general optimization tips:

- Remove unused variables and imports
- Use appropriate data structures (lists vs sets vs dicts)
- Avoid nested loops when possible
- Cache expensive operations
- Use list comprehensions for simple transformations

Set up AI services for detailed, code-specific optimization suggestions.";

const GENERAL_TEXT: &str = "I'm currently running in limited mode without AI services.

To enable full AI capabilities:
1. Set OPENAI_API_KEY or GROQ_API_KEY environment variable for online mode
2. Set up llama.cpp with a local model for offline mode

I can still help you with file operations, editing, and basic code management.";

impl FallbackCategory {
    /// Pick a category by case-insensitive keyword.
    /// Priority: explain, translate, optimize, then general.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("explain") {
            Self::Explain
        } else if lower.contains("translate") {
            Self::Translate
        } else if lower.contains("optimize") {
            Self::Optimize
        } else {
            Self::General
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Explain => EXPLAIN_TEXT,
            Self::Translate => TRANSLATE_TEXT,
            Self::Optimize => OPTIMIZE_TEXT,
            Self::General => GENERAL_TEXT,
        }
    }
}

/// Guidance text for a prompt. Never fails.
pub fn fallback_text(prompt: &str) -> &'static str {
    FallbackCategory::classify(prompt).text()
}
