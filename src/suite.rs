//! Named scenarios and a runner that records one verdict per scenario.
//!
//! Scenarios run on the calling task without spawning. By default they run one
//! after another, so scenarios sharing a broadcasting endpoint do not see each
//! other's traffic; a concurrent suite polls them together instead.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::payload::Clock;
use crate::probe::{FanOutVerifier, LatencyProbe};
use crate::transport::Connector;

/// Display title of the latency scenario in [`Suite::standard`].
pub const LATENCY_TITLE: &str = "Test 1: Check Connection and Latency Performance";

/// Display title of the fan-out scenario in [`Suite::standard`].
pub const FAN_OUT_TITLE: &str = "Test 2: Concurrent Clients and Message Fan-out";

type ScenarioFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named async check.
pub struct Scenario {
    name: String,
    title: Option<String>,
    run: ScenarioFn,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl Scenario {
    /// Create a scenario; `run` is called once per suite run.
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            run: Box::new(move || run().boxed()),
        }
    }

    /// Attach a display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The scenario's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scenario's display title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    async fn execute(&self) -> Outcome {
        let start = Instant::now();
        let result = (self.run)().await;
        let elapsed = start.elapsed();
        match &result {
            Ok(()) => info!(scenario = %self.name, "passed"),
            Err(e) => warn!(scenario = %self.name, error = %e, "failed"),
        }
        Outcome {
            name: self.name.clone(),
            title: self.title.clone(),
            result,
            elapsed,
        }
    }
}

/// Verdict of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Scenario name.
    pub name: String,
    /// Scenario display title.
    pub title: Option<String>,
    /// `Ok` if the scenario passed, otherwise the failure.
    pub result: Result<()>,
    /// Wall time the scenario took.
    pub elapsed: Duration,
}

impl Outcome {
    /// Whether the scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    /// Title if one was attached, else the name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Verdicts of one suite run, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    /// One outcome per scenario.
    pub outcomes: Vec<Outcome>,
}

impl SuiteReport {
    /// Whether every scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(Outcome::passed)
    }

    /// Outcomes of failed scenarios.
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// Look up an outcome by scenario name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            let ms = outcome.elapsed.as_secs_f64() * 1000.0;
            match &outcome.result {
                Ok(()) => writeln!(f, "PASS  {} ({ms:.2} ms)", outcome.label())?,
                Err(e) => writeln!(f, "FAIL  {} ({ms:.2} ms): {e}", outcome.label())?,
            }
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} scenarios, {} passed, {} failed",
            self.outcomes.len(),
            self.outcomes.len() - failed,
            failed
        )
    }
}

/// An ordered set of scenarios.
#[derive(Debug, Default)]
pub struct Suite {
    scenarios: Vec<Scenario>,
    concurrent: bool,
}

impl Suite {
    /// Create an empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The latency probe and the fan-out verifier, configured from `config`.
    pub fn standard<K, C>(config: &Config, connector: K, clock: C) -> Self
    where
        K: Connector + 'static,
        C: Clock + 'static,
    {
        let connector = Arc::new(connector);
        let clock = Arc::new(clock);

        let latency = {
            let probe = LatencyProbe::from_config(config);
            let connector = Arc::clone(&connector);
            let clock = Arc::clone(&clock);
            Scenario::new("latency", move || {
                let probe = probe.clone();
                let connector = Arc::clone(&connector);
                let clock = Arc::clone(&clock);
                async move {
                    let report = probe.run(&*connector, &*clock).await?.into_result()?;
                    info!(
                        latency_ms = report.elapsed().as_secs_f64() * 1000.0,
                        "round trip"
                    );
                    Ok(())
                }
            })
            .with_title(LATENCY_TITLE)
        };

        let fan_out = {
            let verifier = FanOutVerifier::from_config(config);
            Scenario::new("fan_out", move || {
                let verifier = verifier.clone();
                let connector = Arc::clone(&connector);
                let clock = Arc::clone(&clock);
                async move {
                    verifier.run(&*connector, &*clock).await?.into_result()?;
                    Ok(())
                }
            })
            .with_title(FAN_OUT_TITLE)
        };

        let mut suite = Self::new();
        suite.add(latency).add(fan_out);
        suite
    }

    /// Poll all scenarios together instead of one after another.
    #[must_use]
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Register a scenario.
    pub fn add(&mut self, scenario: Scenario) -> &mut Self {
        self.scenarios.push(scenario);
        self
    }

    /// Registered scenarios, in order.
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Run every scenario once on the current task.
    pub async fn run(&self) -> SuiteReport {
        let outcomes = if self.concurrent {
            join_all(self.scenarios.iter().map(Scenario::execute)).await
        } else {
            let mut outcomes = Vec::with_capacity(self.scenarios.len());
            for scenario in &self.scenarios {
                outcomes.push(scenario.execute().await);
            }
            outcomes
        };
        SuiteReport { outcomes }
    }
}
