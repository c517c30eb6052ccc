/// Why a command line could not be split.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("no closing quotation")]
    UnclosedQuote,
    #[error("no escaped character")]
    TrailingEscape,
}

/// Shell-like word splitting.
///
/// - Whitespace separates words.
/// - Single quotes preserve everything up to the next single quote.
/// - Double quotes preserve whitespace; `\` escapes the next character inside
///   them.
/// - Outside quotes `\` escapes the next character.
/// - Adjacent quoted and unquoted parts join into one word, and `""` yields an
///   empty word.
pub fn shell_split(input: &str) -> Result<Vec<String>, SplitError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\'' if in_single_quote => in_single_quote = false,
            _ if in_single_quote => current.push(ch),
            '"' if in_double_quote => in_double_quote = false,
            '\\' => {
                escape_next = true;
                in_word = true;
            }
            _ if in_double_quote => current.push(ch),
            '\'' => {
                in_single_quote = true;
                in_word = true;
            }
            '"' => {
                in_double_quote = true;
                in_word = true;
            }
            c if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            _ => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if escape_next {
        return Err(SplitError::TrailingEscape);
    }
    if in_single_quote || in_double_quote {
        return Err(SplitError::UnclosedQuote);
    }
    if in_word {
        args.push(current);
    }

    Ok(args)
}
