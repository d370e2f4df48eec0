use blockguard_core::{ParseError, RuleSet, TreeWalk, Validator, parse_blocks, walk};

/// Parse `markup` once and walk the resulting tree.
pub fn detect(
    markup: &str,
    validator: &Validator<'_>,
    rules: &RuleSet,
) -> Result<TreeWalk, ParseError> {
    let blocks = parse_blocks(markup)?;
    Ok(walk(&blocks, validator, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockguard_core::{BlockRegistry, IssueKind, Severity};

    #[test]
    fn unregistered_custom_block_is_high() {
        let registry = BlockRegistry::new();
        let found = detect(
            "<!-- wp:custom/ghost-block /-->",
            &Validator::new(&registry),
            &RuleSet::default(),
        )
        .unwrap();
        assert_eq!(found.issues.len(), 1);
        assert_eq!(found.issues[0].kind, IssueKind::UnregisteredCustomBlock);
        assert_eq!(found.issues[0].severity, Severity::High);
    }

    #[test]
    fn malformed_markup_is_an_error() {
        let registry = BlockRegistry::new();
        let result = detect(
            "<!-- /wp:paragraph -->",
            &Validator::new(&registry),
            &RuleSet::default(),
        );
        assert!(result.is_err());
    }
}
