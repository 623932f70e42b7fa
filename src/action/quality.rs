// src/action/quality.rs

//! Data-quality checks: scalar queries compared against expected values.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::action::{ExecutionContext, ExecutionError, TaskAction};

/// One check: a query expected to return a single scalar equal to `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityCheck {
    pub query: String,
    pub expected: i64,
}

/// Runs an ordered list of checks and fails on the first mismatch.
///
/// A mismatch is a [`ExecutionError::Validation`] and is never retried:
/// the data under test does not change between attempts.
#[derive(Debug, Clone)]
pub struct QualityCheckAction {
    checks: Vec<QualityCheck>,
}

impl QualityCheckAction {
    pub fn new(checks: Vec<QualityCheck>) -> Self {
        Self { checks }
    }
}

impl TaskAction for QualityCheckAction {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            info!(checks = self.checks.len(), "running data quality checks");

            for (index, check) in self.checks.iter().enumerate() {
                ctx.check_cancelled()?;

                let actual = ctx.warehouse().query_scalar(&check.query)?;
                if actual != check.expected {
                    return Err(ExecutionError::Validation(format!(
                        "check #{} `{}` returned {}, expected {}",
                        index + 1,
                        check.query,
                        actual,
                        check.expected
                    )));
                }

                info!(check = index + 1, value = actual, "quality check passed");
            }

            Ok(())
        })
    }
}
