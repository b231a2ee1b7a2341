//! Scenario builder with oracle checks.
//!
//! A scenario is a seed, optional network conditions and a script of engine
//! commands. Running it builds a fresh engine on a [`SimEnv`], feeds the
//! script and then hands the resulting world to the oracle.
//!
//! ```rust,ignore
//! Scenario::new()
//!     .with_seed(7)
//!     .command(Command::ChangeZone(Zone::Cellular))
//!     .advance(2_000)
//!     .oracle(Box::new(|world| {
//!         assert!(world.engine().migration().tcp.connected);
//!         Ok(())
//!     }))
//!     .run()?;
//! ```

use std::time::Duration;

use thiserror::Error;
use tvilling_engine::{Command, Engine, EngineConfig, EngineError, EngineEvent};
use tvilling_proto::NetworkProfile;

use crate::sim_env::SimEnv;

/// Check run against the finished world.
pub type Oracle = Box<dyn Fn(&ScenarioWorld) -> Result<(), String>>;

/// Errors from running a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The engine could not be built.
    #[error("scenario setup failed: {0}")]
    Setup(#[from] EngineError),

    /// The oracle rejected the final world.
    #[error("oracle failed: {0}")]
    Oracle(String),
}

/// State left behind by a scenario run.
pub struct ScenarioWorld {
    engine: Engine<SimEnv>,
    env: SimEnv,
    events: Vec<EngineEvent>,
    rejected: Vec<(usize, EngineError)>,
}

impl ScenarioWorld {
    /// The engine after the script ran.
    pub const fn engine(&self) -> &Engine<SimEnv> {
        &self.engine
    }

    /// The environment the engine ran on.
    pub const fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Every event emitted, in order.
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Script index and error of every rejected command.
    pub fn rejected(&self) -> &[(usize, EngineError)] {
        &self.rejected
    }
}

/// Scripted engine run.
pub struct Scenario {
    seed: u64,
    config: EngineConfig,
    profile: Option<NetworkProfile>,
    script: Vec<Command>,
    oracle: Option<Oracle>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// Empty script, seed 0, default configuration.
    pub fn new() -> Self {
        Self {
            seed: 0,
            config: EngineConfig::default(),
            profile: None,
            script: Vec::new(),
            oracle: None,
        }
    }

    /// Seed for the environment RNG.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Network conditions applied before the script.
    #[must_use]
    pub const fn with_profile(mut self, profile: NetworkProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Append a command.
    #[must_use]
    pub fn command(mut self, command: Command) -> Self {
        self.script.push(command);
        self
    }

    /// Append many commands.
    #[must_use]
    pub fn commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.script.extend(commands);
        self
    }

    /// Append an advance of virtual time.
    #[must_use]
    pub fn advance(self, elapsed_ms: u64) -> Self {
        self.command(Command::Advance { elapsed_ms })
    }

    /// Set the oracle.
    #[must_use]
    pub fn oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Run the script and check the oracle.
    ///
    /// Rejected commands do not stop the run; they are recorded on the
    /// world for the oracle to inspect.
    pub fn run(self) -> Result<ScenarioWorld, ScenarioError> {
        let env = SimEnv::with_seed(self.seed);
        let mut engine = Engine::new(env.clone(), self.config)?;
        let mut events = Vec::new();
        let mut rejected = Vec::new();

        if let Some(profile) = self.profile {
            events.extend(engine.handle(Command::SetNetworkProfile(profile))?);
        }

        for (index, command) in self.script.into_iter().enumerate() {
            if let Command::Advance { elapsed_ms } = command {
                env.advance(Duration::from_millis(elapsed_ms));
            }
            match engine.handle(command) {
                Ok(emitted) => events.extend(emitted),
                Err(error) => rejected.push((index, error)),
            }
        }

        let world = ScenarioWorld { engine, env, events, rejected };
        if let Some(oracle) = &self.oracle {
            oracle(&world).map_err(ScenarioError::Oracle)?;
        }
        Ok(world)
    }
}
