use winnow::combinator::{cut_err, not};
use winnow::prelude::*;
use winnow::token::{none_of, take_while};

use crate::error::{reject, ClauseResult, Malformed};

fn is_repo_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/'
}

/// Parse a repository id. The cursor sits just past the `::` and is left
/// on the `[` of a following use clause or at the end.
pub(crate) fn parse_repo_clause<'s>(input: &mut &'s str) -> ClauseResult<&'s str> {
    cut_err(not('-'))
        .context(Malformed::InvalidRepoFirstChar)
        .parse_next(input)?;
    let repo = take_while(0.., is_repo_char).parse_next(input)?;
    cut_err(not(none_of('[')))
        .context(Malformed::InvalidRepoChar)
        .parse_next(input)?;
    if repo.is_empty() {
        return reject(input, Malformed::EmptyRepoId);
    }
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::reason_of;

    fn parse(input: &str) -> (Result<&str, Malformed>, &str) {
        let mut cursor = input;
        let res = parse_repo_clause(&mut cursor).map_err(reason_of);
        (res, cursor)
    }

    #[test]
    fn test_repo_parsing() {
        assert_eq!(parse("gentoo"), (Ok("gentoo"), ""));
        assert_eq!(parse("my_overlay-2[foo]"), (Ok("my_overlay-2"), "[foo]"));
        assert_eq!(parse("a/b").0, Ok("a/b"));
    }

    #[test]
    fn test_repo_errors() {
        assert_eq!(parse("-x").0, Err(Malformed::InvalidRepoFirstChar));
        assert_eq!(parse("gen:too").0, Err(Malformed::InvalidRepoChar));
        assert_eq!(parse("gen.too").0, Err(Malformed::InvalidRepoChar));
        assert_eq!(parse(".x").0, Err(Malformed::InvalidRepoChar));
        assert_eq!(parse("").0, Err(Malformed::EmptyRepoId));
        assert_eq!(parse("[foo]").0, Err(Malformed::EmptyRepoId));
    }
}
