//! The atom table for words and nonterminal labels.
//!
//! Every word and label seen while loading a model is interned into a
//! [`Vocab`]; the decoder then compares and hashes small integers instead of
//! strings.  Once loading is done the vocabulary is frozen inside the shared
//! model and never mutated again, so that sentences can be decoded in
//! parallel.  Tokens of an input sentence which the model has never seen are
//! interned into a per-sentence [`SentenceVocab`] overlay, which hands out
//! atoms above the range of the shared table.

use crate::util::HashMap;
use std::fmt;

/// Opacified number representing a single interned string.
///
/// Atoms are never reused; atom 0 is reserved and never handed out.
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Default, Hash)]
pub struct Atom(u32);

/// A target or source word.
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Default, Hash)]
pub struct Word(pub Atom);

/// A nonterminal label, such as `X` or `S`.
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Default, Hash)]
pub struct Label(pub Atom);

#[derive(Default, Debug, Clone)]
struct AtomTable {
    table: HashMap<Box<str>, Atom>,
    reverse: Vec<Box<str>>,
}

impl AtomTable {
    fn intern(&mut self, name: &str, first: u32) -> Atom {
        if let Some(&atom) = self.table.get(name) {
            return atom;
        }
        let next = self.reverse.len() as u64 + u64::from(first);
        assert!(next < u64::from(u32::MAX), "atom table overflowed");
        let atom = Atom(next as u32);
        self.table.insert(name.into(), atom);
        self.reverse.push(name.into());
        atom
    }

    fn lookup(&self, name: &str) -> Option<Atom> {
        self.table.get(name).copied()
    }
}

/// The shared vocabulary of a model.
#[derive(Default, Debug, Clone)]
pub struct Vocab {
    atoms: AtomTable,
}

impl Vocab {
    /// Creates an empty vocabulary.
    #[must_use]
    pub fn new() -> Vocab {
        Vocab::default()
    }

    /// Interns a word.
    pub fn word(&mut self, text: &str) -> Word {
        Word(self.atoms.intern(text, 1))
    }

    /// Interns a nonterminal label, given without brackets.
    pub fn label(&mut self, name: &str) -> Label {
        Label(self.atoms.intern(name, 1))
    }

    /// Looks up a word without interning it.
    #[must_use]
    pub fn lookup_word(&self, text: &str) -> Option<Word> {
        self.atoms.lookup(text).map(Word)
    }

    /// Looks up a label without interning it.
    #[must_use]
    pub fn lookup_label(&self, name: &str) -> Option<Label> {
        self.atoms.lookup(name).map(Label)
    }

    /// Number of atoms in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.reverse.len()
    }

    /// Returns true if nothing was interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.reverse.is_empty()
    }

    /// Returns the text of an atom of this table, or `None` if the atom was
    /// not allocated here.
    #[must_use]
    pub fn name(&self, atom: Atom) -> Option<&str> {
        let index = (atom.0 as usize).checked_sub(1)?;
        self.atoms.reverse.get(index).map(|name| &**name)
    }
}

/// A sentence-scoped extension of the shared vocabulary.
///
/// Lookups go to the shared table first; strings unknown to it are interned
/// locally.  Local atoms are only meaningful for the sentence for which they
/// were created, and are discarded by [`SentenceVocab::reset`].
#[derive(Debug)]
pub struct SentenceVocab<'a> {
    base: &'a Vocab,
    local: AtomTable,
}

impl<'a> SentenceVocab<'a> {
    /// Creates an empty overlay on top of `base`.
    #[must_use]
    pub fn new(base: &'a Vocab) -> Self {
        SentenceVocab {
            base,
            local: AtomTable::default(),
        }
    }

    fn first_local(&self) -> u32 {
        self.base.len() as u32 + 1
    }

    /// Interns a word, locally if the shared vocabulary does not know it.
    pub fn word(&mut self, text: &str) -> Word {
        match self.base.lookup_word(text) {
            Some(word) => word,
            None => {
                let first = self.first_local();
                Word(self.local.intern(text, first))
            }
        }
    }

    /// Returns true if the word was interned for this sentence only.
    #[must_use]
    pub fn is_local(&self, word: Word) -> bool {
        word.0 .0 >= self.first_local()
    }

    /// The shared vocabulary.
    #[must_use]
    pub const fn base(&self) -> &'a Vocab {
        self.base
    }

    /// Returns the text of a word or label atom.
    ///
    /// ## Panics
    /// Panics if the atom does not belong to this vocabulary (a handle from
    /// a previous sentence, for instance).
    #[must_use]
    pub fn name(&self, atom: Atom) -> &str {
        if let Some(name) = self.base.name(atom) {
            return name;
        }
        let index = (atom.0 - self.first_local()) as usize;
        &self.local.reverse[index]
    }

    /// Forgets all local atoms.
    pub fn reset(&mut self) {
        self.local.table.clear();
        self.local.reverse.clear();
    }
}

/// Display helper for a label, rendered as `[NAME]`.
pub struct LabelRef<'a>(pub &'a SentenceVocab<'a>, pub Label);

impl fmt::Display for LabelRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.name(self.1 .0))
    }
}
