//! Stage execution: single-pass or loop-to-fixpoint application of a
//! transformation, with per-iteration and final emission policy.

use std::fmt;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::config::StageConfig;
use crate::sink::Sink;
use crate::transform::Transform;

/// The configured `max_iterations` guard tripped before a fixpoint.
///
/// Surfaced through `anyhow`; callers classify it with `downcast_ref` (the
/// CLI maps it to its own exit code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationLimitExceeded {
    pub limit: u64,
}

impl fmt::Display for IterationLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no fixpoint after {} iterations (max_iterations)",
            self.limit
        )
    }
}

impl std::error::Error for IterationLimitExceeded {}

/// Summary of one stage execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Final transformed text (computed regardless of any silence flags).
    pub output: String,
    /// Number of transformation applications performed.
    pub applications: u32,
}

/// Applies one transformation to an input string under a fixed emission and
/// looping policy.
///
/// Owns its [`StageConfig`] and [`Transform`]; the output [`Sink`] is passed
/// per call so the same runner can target different destinations. Each call
/// is independent: the runner holds no per-call state, so failures mid-loop
/// need no cleanup.
pub struct StageRunner<T: Transform> {
    config: StageConfig,
    transform: T,
}

impl<T: Transform> StageRunner<T> {
    pub fn new(config: StageConfig, transform: T) -> Self {
        Self { config, transform }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Run the stage and return only the final text.
    pub fn execute<S: Sink>(&self, input: &str, sink: &mut S) -> Result<String> {
        Ok(self.run(input, sink)?.output)
    }

    /// Run the stage over `input`.
    ///
    /// Without looping: exactly one application, no per-iteration writes.
    ///
    /// With looping: apply repeatedly until an application leaves the text
    /// unchanged. The comparison happens after each application, so the
    /// transformation always runs at least once, and the confirming
    /// (no-change) application is itself emitted before the loop exits.
    /// A transformation that never converges loops forever unless
    /// `max_iterations` is set, in which case the stage fails with
    /// [`IterationLimitExceeded`] once the limit is reached.
    ///
    /// The final result is emitted only when `silent` is explicitly `false`;
    /// an absent `silent` suppresses output (see [`StageConfig::silent`]).
    /// The returned outcome carries the final text regardless of emission.
    ///
    /// Transform and sink failures stop the stage immediately and propagate
    /// unchanged.
    #[instrument(skip_all, fields(looping = self.config.loop_until_fixpoint))]
    pub fn run<S: Sink>(&self, input: &str, sink: &mut S) -> Result<StageOutcome> {
        let mut applications = 0u32;
        let output = if self.config.loop_until_fixpoint {
            let mut result = input.to_string();
            loop {
                if let Some(limit) = self.config.max_iterations {
                    if u64::from(applications) >= limit {
                        return Err(IterationLimitExceeded { limit }.into());
                    }
                }
                let previous = result;
                result = self.transform.apply(&previous)?;
                applications += 1;
                debug!(iteration = applications, bytes = result.len(), "applied");
                if !self.config.iteration_silent {
                    emit(sink, &result, self.config.iteration_trailing_newline)?;
                }
                if result == previous {
                    break;
                }
            }
            result
        } else {
            applications = 1;
            self.transform.apply(input)?
        };

        // Quirk preserved from the original stage: absent means silent.
        if !self.config.silent.unwrap_or(true) {
            emit(sink, &output, self.config.trailing_newline)?;
        }

        debug!(applications, bytes = output.len(), "stage complete");
        Ok(StageOutcome {
            output,
            applications,
        })
    }
}

fn emit<S: Sink>(sink: &mut S, text: &str, trailing_newline: bool) -> Result<()> {
    if trailing_newline {
        sink.write_line(text)
    } else {
        sink.write_chunk(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingTransform, FailingSink, RecordingSink};
    use anyhow::anyhow;

    fn replace_a_with_b(input: &str) -> Result<String> {
        Ok(input.replace('a', "b"))
    }

    fn looping_config() -> StageConfig {
        StageConfig {
            loop_until_fixpoint: true,
            ..StageConfig::default()
        }
    }

    #[test]
    fn single_pass_applies_exactly_once() {
        let transform = CountingTransform::new(replace_a_with_b);
        let counter = transform.counter();
        let runner = StageRunner::new(StageConfig::default(), transform);
        let mut sink = RecordingSink::new();

        let outcome = runner.run("aaa", &mut sink).expect("run");

        assert_eq!(outcome.output, "bbb");
        assert_eq!(outcome.applications, 1);
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn loop_stops_one_application_after_the_value_stabilizes() {
        // "aaa" -> "bbb" (changed) -> "bbb" (confirms the fixpoint).
        let transform = CountingTransform::new(replace_a_with_b);
        let counter = transform.counter();
        let runner = StageRunner::new(looping_config(), transform);
        let mut sink = RecordingSink::new();

        let outcome = runner.run("aaa", &mut sink).expect("run");

        assert_eq!(outcome.output, "bbb");
        assert_eq!(outcome.applications, 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn immediate_fixpoint_stops_after_one_application() {
        let identity = CountingTransform::new(|input: &str| Ok(input.to_string()));
        let runner = StageRunner::new(looping_config(), identity);
        let mut sink = RecordingSink::new();

        let outcome = runner.run("hello", &mut sink).expect("run");

        assert_eq!(outcome.output, "hello");
        assert_eq!(outcome.applications, 1);
    }

    #[test]
    fn every_loop_application_is_emitted_including_the_confirming_one() {
        let runner = StageRunner::new(looping_config(), replace_a_with_b);
        let mut sink = RecordingSink::new();

        runner.run("aaa", &mut sink).expect("run");

        assert_eq!(sink.texts(), vec!["bbb", "bbb"]);
        assert!(sink.writes.iter().all(|w| w.newline));
    }

    #[test]
    fn iteration_silent_suppresses_loop_emission() {
        let config = StageConfig {
            iteration_silent: true,
            ..looping_config()
        };
        let runner = StageRunner::new(config, replace_a_with_b);
        let mut sink = RecordingSink::new();

        let outcome = runner.run("aaa", &mut sink).expect("run");

        assert!(sink.writes.is_empty());
        assert_eq!(outcome.output, "bbb");
    }

    #[test]
    fn final_emission_requires_explicit_print() {
        // silent = None behaves like silent = Some(true): no final write.
        for silent in [None, Some(true)] {
            let config = StageConfig {
                silent,
                ..StageConfig::default()
            };
            let runner = StageRunner::new(config, replace_a_with_b);
            let mut sink = RecordingSink::new();
            runner.run("aaa", &mut sink).expect("run");
            assert!(sink.writes.is_empty(), "silent={silent:?}");
        }

        let config = StageConfig {
            silent: Some(false),
            ..StageConfig::default()
        };
        let runner = StageRunner::new(config, replace_a_with_b);
        let mut sink = RecordingSink::new();
        runner.run("aaa", &mut sink).expect("run");
        assert_eq!(sink.texts(), vec!["bbb"]);
    }

    #[test]
    fn terminator_follows_the_matching_flag() {
        let config = StageConfig {
            iteration_trailing_newline: false,
            silent: Some(false),
            trailing_newline: true,
            ..looping_config()
        };
        let runner = StageRunner::new(config, replace_a_with_b);
        let mut sink = RecordingSink::new();

        runner.run("aaa", &mut sink).expect("run");

        // Two chunk writes from the loop, one line write for the final result.
        let newlines: Vec<bool> = sink.writes.iter().map(|w| w.newline).collect();
        assert_eq!(newlines, vec![false, false, true]);
    }

    #[test]
    fn returned_output_is_independent_of_silence() {
        for (silent, iteration_silent) in [(None, false), (Some(true), true), (Some(false), false)]
        {
            let config = StageConfig {
                silent,
                iteration_silent,
                ..looping_config()
            };
            let runner = StageRunner::new(config, replace_a_with_b);
            let mut sink = RecordingSink::new();
            let outcome = runner.run("aaa", &mut sink).expect("run");
            assert_eq!(outcome.output, "bbb");
        }
    }

    #[test]
    fn empty_input_is_accepted() {
        let runner = StageRunner::new(looping_config(), replace_a_with_b);
        let mut sink = RecordingSink::new();

        let outcome = runner.run("", &mut sink).expect("run");

        assert_eq!(outcome.output, "");
        assert_eq!(outcome.applications, 1);
    }

    #[test]
    fn iteration_limit_fails_non_converging_loop() {
        // Appending always changes the text, so a fixpoint never arrives.
        let grow = |input: &str| Ok(format!("{input}x"));
        let config = StageConfig {
            iteration_silent: true,
            max_iterations: Some(5),
            ..looping_config()
        };
        let runner = StageRunner::new(config, grow);
        let mut sink = RecordingSink::new();

        let err = runner.run("seed", &mut sink).unwrap_err();

        let limit = err
            .downcast_ref::<IterationLimitExceeded>()
            .expect("typed error");
        assert_eq!(limit.limit, 5);
    }

    #[test]
    fn iteration_limit_allows_loops_that_converge_in_time() {
        let config = StageConfig {
            iteration_silent: true,
            max_iterations: Some(2),
            ..looping_config()
        };
        let runner = StageRunner::new(config, replace_a_with_b);
        let mut sink = RecordingSink::new();

        let outcome = runner.run("aaa", &mut sink).expect("run");

        assert_eq!(outcome.applications, 2);
    }

    #[test]
    fn sink_failure_stops_the_loop_and_propagates() {
        // The first per-iteration write fails, so no further applications run.
        let transform = CountingTransform::new(replace_a_with_b);
        let counter = transform.counter();
        let runner = StageRunner::new(looping_config(), transform);
        let mut sink = FailingSink;

        let err = runner.run("aaa", &mut sink).unwrap_err();

        assert!(err.to_string().contains("sink is closed"));
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn final_sink_failure_propagates() {
        let config = StageConfig {
            silent: Some(false),
            ..StageConfig::default()
        };
        let runner = StageRunner::new(config, replace_a_with_b);
        let mut sink = FailingSink;

        let err = runner.run("aaa", &mut sink).unwrap_err();

        assert!(err.to_string().contains("sink is closed"));
    }

    #[test]
    fn runner_exposes_its_bound_config() {
        let runner = StageRunner::new(looping_config(), replace_a_with_b);
        assert!(runner.config().loop_until_fixpoint);
        assert_eq!(runner.config().silent, None);
    }

    #[test]
    fn transform_failure_propagates_unchanged() {
        let failing = |_: &str| -> Result<String> { Err(anyhow!("pattern backend broke")) };
        let runner = StageRunner::new(looping_config(), failing);
        let mut sink = RecordingSink::new();

        let err = runner.run("aaa", &mut sink).unwrap_err();

        assert!(err.to_string().contains("pattern backend broke"));
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn execute_returns_the_final_text() {
        let runner = StageRunner::new(looping_config(), replace_a_with_b);
        let mut sink = RecordingSink::new();
        assert_eq!(runner.execute("aaa", &mut sink).expect("execute"), "bbb");
    }
}
