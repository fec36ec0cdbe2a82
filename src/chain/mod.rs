// Chain resolution - template gates filtered into the effective chain for one document

pub mod resolver;
pub mod rules;

pub use resolver::{ChainError, ChainResolver, EffectiveChain};
pub use rules::{ChainContext, ChainRule, HighAuthorityThresholdRule};
