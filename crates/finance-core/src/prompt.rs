//! Advice Prompt
//!
//! The question is interpolated as-is. Nothing guards against instructions
//! smuggled inside it.

use crate::error::Result;
use crate::summary::MonthlySummary;

/// Render a summary the way it is embedded in the prompt
pub fn render_summary(summary: &MonthlySummary) -> Result<String> {
    summary.to_pretty_json()
}

/// Fill the advice template with a rendered summary and the user's question
pub fn build_prompt(summary: &str, user_question: &str) -> String {
    format!(
        r#"
You're a smart, friendly personal finance assistant.

Here's what the user spent recently:
{summary}

Now they asked:
"{user_question}"

Give helpful, personalized budgeting advice.
"#
    )
}
