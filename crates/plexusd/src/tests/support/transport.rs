//! Mock group transport for run-loop and forwarder tests.

use mockall::mock;

use crate::forward::{CompletionHandle, GroupTransport, PeerId, SubmitError};
use crate::request::Operation;

mock! {
    pub Transport {}
    impl GroupTransport for Transport {
        fn local(&self) -> PeerId;
        fn followers(&self) -> Vec<PeerId>;
        fn leader(&self) -> Option<PeerId>;
        fn submit(
            &self,
            target: PeerId,
            operation: Operation,
            completion: CompletionHandle,
        ) -> Result<(), SubmitError>;
    }
}
