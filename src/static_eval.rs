//! Static specifier evaluator.
//!
//! Folds a restricted subset of expressions to a concrete string at
//! compile time. The folder deliberately refuses anything it cannot
//! prove: no side effects, no control flow, no reassignable bindings.
//! Tagged templates and unresolvable interpolations are rejected even
//! when a richer evaluator could fold them; widening the accepted
//! grammar would reclassify previously-dynamic sites as static.

use crate::scope::ScopeTracker;
use oxc_ast::ast::Expression;
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::BinaryOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldCause {
    /// A template interpolation whose expression does not fold.
    DynamicInterpolation,
    /// The argument is a tagged template expression.
    TaggedTemplate,
    /// A literal of another type, or an otherwise non-foldable
    /// expression.
    NonString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldError {
    pub cause: FoldCause,
    pub span: Span,
}

impl FoldError {
    fn non_string(span: Span) -> Self {
        Self {
            cause: FoldCause::NonString,
            span,
        }
    }
}

/// Fold `expr` to a string. The accepted grammar:
///
/// - string literal;
/// - template literal, folding every interpolation;
/// - binary `+`, concatenating both folded sides;
/// - identifier bound to an in-scope `const` whose initializer folded
///   (read from the tracker's const-string environment);
/// - parenthesized form of any of the above.
pub fn fold_specifier(expr: &Expression, scopes: &ScopeTracker) -> Result<String, FoldError> {
    match expr {
        Expression::StringLiteral(lit) => Ok(lit.value.to_string()),
        Expression::TemplateLiteral(template) => {
            let mut result = String::new();
            for (i, quasi) in template.quasis.iter().enumerate() {
                match &quasi.value.cooked {
                    Some(cooked) => result.push_str(cooked.as_str()),
                    None => return Err(FoldError::non_string(quasi.span)),
                }
                if let Some(interp) = template.expressions.get(i) {
                    match fold_specifier(interp, scopes) {
                        Ok(value) => result.push_str(&value),
                        Err(_) => {
                            return Err(FoldError {
                                cause: FoldCause::DynamicInterpolation,
                                span: interp.span(),
                            })
                        }
                    }
                }
            }
            Ok(result)
        }
        Expression::TaggedTemplateExpression(tagged) => Err(FoldError {
            cause: FoldCause::TaggedTemplate,
            span: tagged.span,
        }),
        Expression::BinaryExpression(binary) if binary.operator == BinaryOperator::Addition => {
            let left = fold_specifier(&binary.left, scopes)?;
            let right = fold_specifier(&binary.right, scopes)?;
            Ok(left + &right)
        }
        Expression::Identifier(ident) => match scopes.const_string(ident.name.as_str()) {
            Some(value) => Ok(value.to_string()),
            None => Err(FoldError::non_string(ident.span)),
        },
        Expression::ParenthesizedExpression(paren) => fold_specifier(&paren.expression, scopes),
        _ => Err(FoldError::non_string(expr.span())),
    }
}
