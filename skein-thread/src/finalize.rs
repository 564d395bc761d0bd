use crate::config::DropPolicy;
use crate::handle::{JoinState, Outcome, TaskOutput, ThreadHandle};

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        let id = self.record.id;
        match self.state.get_mut() {
            JoinState::Joined(_) | JoinState::Joining => return,
            JoinState::Detached => {
                if let Some(TaskOutput::Failed(failure)) = self.record.output.get() {
                    tracing::debug!(task = id, error = %failure, "detached thread had failed");
                }
                return;
            }
            JoinState::Pending(_) => {}
        }

        match self.drop_policy {
            DropPolicy::Join => match self.join() {
                Ok(Outcome::Done(_)) => {
                    tracing::trace!(task = id, "joined thread on drop");
                }
                Ok(Outcome::Failed(failure)) => {
                    tracing::warn!(
                        task = id,
                        error = %failure,
                        "thread dropped without join failed"
                    );
                }
                Err(e) => {
                    tracing::warn!(task = id, error = %e, "could not join dropped thread");
                }
            },
            DropPolicy::Detach => {
                if let Err(e) = self.detach() {
                    tracing::warn!(task = id, error = %e, "could not detach dropped thread");
                } else {
                    tracing::debug!(task = id, "thread dropped without join; detached");
                }
            }
        }
    }
}
