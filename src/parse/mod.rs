//! Text format for rule trees.
//!
//! ```text
//! ruleset SingleStockHedge
//!
//! rule StatusWorking:
//!     equals(OrderStatus, "WORKING")
//!
//! rule Filled50Percent (under StatusWorking):
//!     percentage(FilledAmount, TotalAmount, 50)
//!
//! rule HedgeRequired (under Filled50Percent):
//!     flag(HedgeRequired)
//!     then CreateHedgeOrder
//! ```

mod error;
mod grammar;
mod parser;

pub use error::ParseError;
pub use parser::{Condition, ParsedRule, ParsedRuleSet};

/// Parse a DSL input string into a [`ParsedRuleSet`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not valid DSL syntax.
pub fn parse(input: &str) -> Result<ParsedRuleSet, ParseError> {
    use winnow::Parser;
    grammar::parse_ruleset
        .parse(input)
        .map_err(|e| ParseError::new(e.offset(), e.inner().to_string()))
}
