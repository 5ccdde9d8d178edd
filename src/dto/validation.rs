//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// Validates a player display name.
///
/// Blank names are accepted (the server generates one); otherwise only letters,
/// digits, spaces, `-`, `_` and `'` are allowed.
///
/// ```ignore
/// validate_player_name("Ada L.")  // Err - `.`
/// validate_player_name("ada_99")  // Ok
/// validate_player_name("")        // Ok - generated
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.chars().count() > MAX_PLAYER_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_LEN} characters").into(),
        );
        return Err(err);
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '\''))
    {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some(
            "Player name may only contain letters, digits, spaces, `-`, `_` and `'`".into(),
        );
        return Err(err);
    }

    Ok(())
}
