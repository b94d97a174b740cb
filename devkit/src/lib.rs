/*!
# StackLedger DevKit - Stubs et Utilitaires pour Tests

Bibliothèque facilitant les tests des collecteurs StackLedger avec:
- Stubs des services OpenStack (Keystone, Nova, Panko) sans réseau
- Builders d'événements et d'hyperviseurs
- Harness de test avec répertoire de sortie temporaire
*/

pub mod fixtures;
pub mod service_stub;
pub mod test_utils;

pub use fixtures::{at, hypervisor, EventBuilder};
pub use service_stub::{StubEventSource, StubIdentity, StubInventory};
pub use test_utils::TestHarness;
