//! Wraps a user prompt in the instructions that keep the base image recognisable.

use crate::error::AppError;

/// Returns the trimmed prompt, or a client error when there's nothing left.
pub fn validate_prompt(prompt: Option<&str>) -> Result<&str, AppError> {
    match prompt.map(str::trim) {
        Some(prompt) if !prompt.is_empty() => Ok(prompt),
        _ => Err(AppError::BadRequest("Prompt is required".to_string())),
    }
}

/// Builds the instruction sent to the model. The user text is embedded verbatim, twice.
pub fn compose_prompt(preserved_feature: &str, user_prompt: &str) -> String {
    format!(
        "Edit the provided image to depict: {user_prompt}.\n\
         Keep {preserved_feature} exactly as it appears in the original: same shape, colour, \
         proportions and placement. Do not remove, move or restyle it.\n\
         You may change the pose, expression, clothing, props, lighting and background so the \
         scene matches the request. Do not add text, captions or watermarks.\n\
         Scene to depict: {user_prompt}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_and_blank_prompts() {
        assert!(matches!(validate_prompt(None), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_prompt(Some("")), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_prompt(Some("  \n\t")), Err(AppError::BadRequest(_))));
        assert_eq!(validate_prompt(Some("  at the beach ")).ok(), Some("at the beach"));
    }

    #[test]
    fn composed_prompt_embeds_user_text_twice() {
        let user = "riding a <bicycle> on \"Mars\"";
        let composed = compose_prompt("the blue scarf", user);
        assert_eq!(composed.matches(user).count(), 2);
        assert!(composed.contains("Keep the blue scarf exactly"));
        assert!(composed.contains("pose"));
        assert!(composed.contains("background"));
    }
}
