//! Token keys and bit sets over them.
//!
//! The parser predicts alternatives and loop continuations from the FIRST
//! sets computed at compilation. Token kinds are numbered densely:
//!
//! ```text
//! [0, K)          keywords, in keyword-list order
//! [K, K + R)      terminal rules, by rule index
//! K + R           end of input
//! ```

/// Dense number of a visible token kind within one grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenKey(pub u32);

#[derive(Clone, Default)]
pub struct TokenSet {
    words: Vec<u64>,
}

impl PartialEq for TokenSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for TokenSet {}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: TokenKey) -> Self {
        let mut set = Self::new();
        set.insert(key);
        set
    }

    pub fn insert(&mut self, key: TokenKey) -> bool {
        let (word, bit) = Self::slot(key);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    pub fn contains(&self, key: TokenKey) -> bool {
        let (word, bit) = Self::slot(key);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Adds every key of `other`; returns whether anything was new.
    pub fn union_with(&mut self, other: &TokenSet) -> bool {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    pub fn union(&self, other: &TokenSet) -> TokenSet {
        let mut set = self.clone();
        set.union_with(other);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenKey> + '_ {
        self.words.iter().enumerate().flat_map(|(index, word)| {
            (0..64u32)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| TokenKey(index as u32 * 64 + bit))
        })
    }

    /// Words up to the last non-zero one.
    fn significant(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|w| *w != 0)
            .map_or(0, |last| last + 1);
        &self.words[..len]
    }

    fn slot(key: TokenKey) -> (usize, u64) {
        ((key.0 / 64) as usize, 1u64 << (key.0 % 64))
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter().map(|k| k.0)).finish()
    }
}

impl FromIterator<TokenKey> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenKey>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}
