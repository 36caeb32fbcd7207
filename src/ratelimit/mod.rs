//! Request admission: access lists, throttle rules and the fixed-window engine.

mod access;
mod backend;
mod counter;
mod engine;
mod identity;
mod key;
mod path;
mod policy;
mod redis_store;
mod rules;

pub use access::AccessList;
pub use backend::CounterStore;
pub use counter::MemoryCounterStore;
pub use engine::{Decision, Engine};
pub use identity::{
    split_host, ClientIpExtractor, IdentitySource, RequestInfo, TrustedProxies, X_FORWARDED_FOR,
};
pub use key::{KeyTemplate, IP_PLACEHOLDER, PATH_PLACEHOLDER};
pub use path::{clean_path, matches as path_matches, PathPattern};
pub use policy::Policy;
pub use redis_store::RedisCounterStore;
pub use rules::{RuleSet, ThrottleRule};
