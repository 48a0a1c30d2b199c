//! WiSARD weightless classifier whose RAMs can also be written by rules.
//!
//! Training and rule injection add evidence to the same counter tables, so
//! classification reads both without a separate path.
//!
//! ```
//! use wisard::{Rule, Wisard, WisardNetwork};
//!
//! let mut wis = Wisard::new(4).unwrap();
//! wis.add_rule(
//!     Rule::new("1", vec![1, 2, 3, 4], vec![vec![1, 1, 0, 1], vec![1, 1, 1, 1]]).weight(5),
//! )
//! .unwrap();
//! let labels = wis.classify_with_rules(&[vec![0, 1, 1, 0, 1]]).unwrap();
//! assert_eq!(labels, vec![Some(String::from("1"))]);
//! ```

pub mod addresser;
pub mod config;
pub mod discriminator;
pub mod error;
pub mod mental_image;
pub mod ram;
pub mod rule;
pub mod wisard;
pub mod wisard_traits;

pub use crate::config::WisardConfig;
pub use crate::error::{Result, WisardError};
pub use crate::mental_image::MentalImage;
pub use crate::rule::Rule;
pub use crate::wisard::{RamsInfo, Vote, Wisard};
pub use crate::wisard_traits::WisardNetwork;
