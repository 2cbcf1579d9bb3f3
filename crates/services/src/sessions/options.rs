use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{OptionId, Question};

/// How answer options are ordered when a question is presented.
///
/// The chosen order is fixed for the lifetime of that presentation and is what
/// gets recorded as the displayed options on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionOrder {
    /// Authoring order.
    #[default]
    Source,
    Shuffled,
}

impl OptionOrder {
    #[must_use]
    pub fn from_shuffle_flag(shuffle: bool) -> Self {
        if shuffle { Self::Shuffled } else { Self::Source }
    }

    #[must_use]
    pub fn arrange(self, question: &Question) -> Vec<OptionId> {
        let mut ids: Vec<OptionId> = question
            .options()
            .iter()
            .map(|o| o.option_id.clone())
            .collect();
        if self == Self::Shuffled {
            let mut rng = rng();
            ids.as_mut_slice().shuffle(&mut rng);
        }
        ids
    }
}
