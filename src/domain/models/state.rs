//! Drone state machine: states, transition tables, and the state graph.
//!
//! Transition tables are static per state and are the single authoritative
//! source for allowed successors. Observed statuses map to the next state
//! through pure functions; the effectful run steps live in
//! `services::lifecycle` and the scheduling in `services::fleet`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::resources::{MachineStatus, ResourceStatus};

/// One observation driving a dispatching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Resource(ResourceStatus),
    Machine(MachineStatus),
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observation::Resource(status) => write!(f, "resource status {status}"),
            Observation::Machine(status) => write!(f, "machine status {status}"),
        }
    }
}

/// Lifecycle state of one drone.
///
/// ```text
/// Request → Booting → Integrate → Integrating → Available
///     Available → Drain → Draining → Disintegrate → ShutDown   (demand drop)
///     Available → ShutDown                                     (node lost)
/// ShutDown → ShuttingDown → Cleanup → Down
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneState {
    Request,
    Booting,
    Integrate,
    Integrating,
    Available,
    Drain,
    Draining,
    Disintegrate,
    ShutDown,
    ShuttingDown,
    Cleanup,
    Down,
}

impl DroneState {
    /// Name used in logs and registry records.
    pub fn name(&self) -> &'static str {
        match self {
            DroneState::Request => "request",
            DroneState::Booting => "booting",
            DroneState::Integrate => "integrate",
            DroneState::Integrating => "integrating",
            DroneState::Available => "available",
            DroneState::Drain => "drain",
            DroneState::Draining => "draining",
            DroneState::Disintegrate => "disintegrate",
            DroneState::ShutDown => "shut_down",
            DroneState::ShuttingDown => "shutting_down",
            DroneState::Cleanup => "cleanup",
            DroneState::Down => "down",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DroneState::Down)
    }

    /// Whether a drone in this state may offer supply. From Drain onwards the
    /// drone is on its way out and must report zero.
    pub fn offers_supply(&self) -> bool {
        !matches!(
            self,
            DroneState::Drain
                | DroneState::Draining
                | DroneState::Disintegrate
                | DroneState::ShutDown
                | DroneState::ShuttingDown
                | DroneState::Cleanup
                | DroneState::Down
        )
    }

    /// Apply this state's transition table to an observation.
    ///
    /// `None` means the observation is not in the table; the orchestrator
    /// treats that as a fatal inconsistency for the drone.
    pub fn observe(self, observation: Observation) -> Option<DroneState> {
        use MachineStatus as M;
        use Observation::{Machine, Resource};
        use ResourceStatus as R;

        match (self, observation) {
            (DroneState::Booting, Resource(R::Booting)) => Some(DroneState::Booting),
            (DroneState::Booting, Resource(R::Running)) => Some(DroneState::Integrate),

            (DroneState::Integrating, Machine(M::NotAvailable)) => Some(DroneState::Integrating),
            (DroneState::Integrating, Machine(M::Available)) => Some(DroneState::Available),

            // An Available reading while draining means the batch system has
            // not flushed the workload yet.
            (DroneState::Draining, Machine(M::Draining | M::Available)) => {
                Some(DroneState::Draining)
            }
            (DroneState::Draining, Machine(M::Drained)) => Some(DroneState::Disintegrate),

            (DroneState::ShuttingDown, Resource(R::Running)) => Some(DroneState::ShuttingDown),
            // A Booting reading after a stop request is inconsistent; hold
            // position and query again.
            (DroneState::ShuttingDown, Resource(R::Booting)) => Some(DroneState::ShuttingDown),
            (DroneState::ShuttingDown, Resource(R::Stopped)) => Some(DroneState::Cleanup),

            _ => None,
        }
    }

    /// Whether `next` is an allowed direct successor of `self`.
    ///
    /// Covers every edge of the state graph: the transition tables, the
    /// Available-state supply/demand decisions, the cancellation teardown
    /// jumps, and the fatal path to Down.
    pub fn valid_successor(self, next: DroneState) -> bool {
        use DroneState::{
            Available, Booting, Cleanup, Disintegrate, Down, Drain, Draining, Integrate,
            Integrating, Request, ShutDown, ShuttingDown,
        };

        match self {
            Request => matches!(next, Booting | Down),
            Booting => matches!(next, Booting | Integrate | ShutDown | Down),
            Integrate => matches!(next, Integrating | ShutDown | Down),
            Integrating => matches!(next, Integrating | Available | ShutDown | Down),
            Available => matches!(next, Available | Drain | ShutDown | Down),
            Drain => matches!(next, Draining | Down),
            Draining => matches!(next, Draining | Disintegrate | Down),
            Disintegrate => matches!(next, ShutDown | Down),
            ShutDown => matches!(next, ShuttingDown | Down),
            ShuttingDown => matches!(next, ShuttingDown | Cleanup | Down),
            Cleanup => matches!(next, Down),
            Down => false,
        }
    }
}

impl fmt::Display for DroneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booting_transitions() {
        assert_eq!(
            DroneState::Booting.observe(Observation::Resource(ResourceStatus::Booting)),
            Some(DroneState::Booting)
        );
        assert_eq!(
            DroneState::Booting.observe(Observation::Resource(ResourceStatus::Running)),
            Some(DroneState::Integrate)
        );
        // Not in the table: fatal for the drone.
        assert_eq!(
            DroneState::Booting.observe(Observation::Resource(ResourceStatus::Stopped)),
            None
        );
        assert_eq!(
            DroneState::Booting.observe(Observation::Resource(ResourceStatus::Deleted)),
            None
        );
    }

    #[test]
    fn test_integrating_transitions() {
        assert_eq!(
            DroneState::Integrating.observe(Observation::Machine(MachineStatus::NotAvailable)),
            Some(DroneState::Integrating)
        );
        assert_eq!(
            DroneState::Integrating.observe(Observation::Machine(MachineStatus::Available)),
            Some(DroneState::Available)
        );
        assert_eq!(
            DroneState::Integrating.observe(Observation::Machine(MachineStatus::Drained)),
            None
        );
    }

    #[test]
    fn test_draining_holds_until_drained() {
        assert_eq!(
            DroneState::Draining.observe(Observation::Machine(MachineStatus::Draining)),
            Some(DroneState::Draining)
        );
        assert_eq!(
            DroneState::Draining.observe(Observation::Machine(MachineStatus::Available)),
            Some(DroneState::Draining)
        );
        assert_eq!(
            DroneState::Draining.observe(Observation::Machine(MachineStatus::Drained)),
            Some(DroneState::Disintegrate)
        );
        assert_eq!(
            DroneState::Draining.observe(Observation::Machine(MachineStatus::NotAvailable)),
            None
        );
    }

    #[test]
    fn test_shutting_down_transitions() {
        assert_eq!(
            DroneState::ShuttingDown.observe(Observation::Resource(ResourceStatus::Running)),
            Some(DroneState::ShuttingDown)
        );
        assert_eq!(
            DroneState::ShuttingDown.observe(Observation::Resource(ResourceStatus::Booting)),
            Some(DroneState::ShuttingDown)
        );
        assert_eq!(
            DroneState::ShuttingDown.observe(Observation::Resource(ResourceStatus::Stopped)),
            Some(DroneState::Cleanup)
        );
        // Not in the table: fatal for the drone.
        assert_eq!(
            DroneState::ShuttingDown.observe(Observation::Resource(ResourceStatus::Deleted)),
            None
        );
    }

    #[test]
    fn test_non_dispatching_states_have_empty_tables() {
        for state in [
            DroneState::Request,
            DroneState::Integrate,
            DroneState::Available,
            DroneState::Drain,
            DroneState::Disintegrate,
            DroneState::ShutDown,
            DroneState::Cleanup,
            DroneState::Down,
        ] {
            for status in [
                ResourceStatus::Booting,
                ResourceStatus::Running,
                ResourceStatus::Stopped,
                ResourceStatus::Deleted,
            ] {
                assert_eq!(state.observe(Observation::Resource(status)), None);
            }
        }
    }

    #[test]
    fn test_terminal_state() {
        assert!(DroneState::Down.is_terminal());
        assert!(!DroneState::Cleanup.is_terminal());
        assert!(!DroneState::Request.is_terminal());
    }

    #[test]
    fn test_supply_is_forbidden_on_the_way_out() {
        for state in [
            DroneState::Drain,
            DroneState::Draining,
            DroneState::Disintegrate,
            DroneState::ShutDown,
            DroneState::ShuttingDown,
            DroneState::Cleanup,
            DroneState::Down,
        ] {
            assert!(!state.offers_supply(), "{state} must not offer supply");
        }
        for state in [
            DroneState::Request,
            DroneState::Booting,
            DroneState::Integrate,
            DroneState::Integrating,
            DroneState::Available,
        ] {
            assert!(state.offers_supply(), "{state} may offer supply");
        }
    }

    #[test]
    fn test_table_edges_are_in_the_state_graph() {
        let resource_statuses = [
            ResourceStatus::Booting,
            ResourceStatus::Running,
            ResourceStatus::Stopped,
            ResourceStatus::Deleted,
        ];
        let machine_statuses = [
            MachineStatus::NotAvailable,
            MachineStatus::Available,
            MachineStatus::Draining,
            MachineStatus::Drained,
        ];
        let states = [
            DroneState::Request,
            DroneState::Booting,
            DroneState::Integrate,
            DroneState::Integrating,
            DroneState::Available,
            DroneState::Drain,
            DroneState::Draining,
            DroneState::Disintegrate,
            DroneState::ShutDown,
            DroneState::ShuttingDown,
            DroneState::Cleanup,
            DroneState::Down,
        ];

        for state in states {
            let observations = resource_statuses
                .iter()
                .map(|s| Observation::Resource(*s))
                .chain(machine_statuses.iter().map(|s| Observation::Machine(*s)));
            for observation in observations {
                if let Some(next) = state.observe(observation) {
                    assert!(
                        state.valid_successor(next),
                        "table edge {state} -> {next} missing from the graph"
                    );
                }
            }
        }
    }

    #[test]
    fn test_down_has_no_successor() {
        for next in [DroneState::Request, DroneState::Down, DroneState::Cleanup] {
            assert!(!DroneState::Down.valid_successor(next));
        }
    }

    #[test]
    fn test_state_names_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&DroneState::ShuttingDown).unwrap(),
            "\"shutting_down\""
        );
        assert_eq!(DroneState::ShutDown.name(), "shut_down");
    }
}
