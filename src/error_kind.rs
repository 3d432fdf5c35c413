use std::any::TypeId;
use std::error::Error as StdError;
use std::fmt;

/// A tag identifying a category of task failure.
///
/// Kinds are either the match-all sentinel [`ErrorKind::Any`] or a concrete error type,
/// built with [`ErrorKind::of`]. A typed kind matches an [`anyhow::Error`] carrying that type
/// directly, behind added context, or anywhere in its `source()` chain.
#[derive(Clone, Copy)]
pub struct ErrorKind {
    repr: Repr,
}

#[derive(Clone, Copy)]
enum Repr {
    Any,
    Type {
        name: &'static str,
        type_id: TypeId,
        matches: fn(&anyhow::Error) -> bool,
    },
}

impl ErrorKind {
    /// Matches every error.
    #[allow(non_upper_case_globals)]
    pub const Any: ErrorKind = ErrorKind { repr: Repr::Any };

    /// Matches errors of type `E`.
    ///
    /// # Example
    ///
    /// ```
    /// use task_autoretry::ErrorKind;
    ///
    /// let kind = ErrorKind::of::<std::io::Error>();
    /// let error = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::TimedOut));
    ///
    /// assert!(kind.matches(&error));
    /// assert!(!kind.matches(&anyhow::anyhow!("not an io error")));
    /// ```
    pub fn of<E>() -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ErrorKind {
            repr: Repr::Type {
                name: std::any::type_name::<E>(),
                type_id: TypeId::of::<E>(),
                matches: |error| {
                    error.downcast_ref::<E>().is_some() || error.chain().any(|cause| cause.is::<E>())
                },
            },
        }
    }

    /// Returns `true` if `error` belongs to this kind.
    pub fn matches(&self, error: &anyhow::Error) -> bool {
        match self.repr {
            Repr::Any => true,
            Repr::Type { matches, .. } => matches(error),
        }
    }

    /// Returns `true` for the match-all sentinel.
    pub fn is_any(&self) -> bool {
        matches!(self.repr, Repr::Any)
    }

    /// Name of the matched error type, `"*"` for the match-all sentinel.
    pub fn name(&self) -> &'static str {
        match self.repr {
            Repr::Any => "*",
            Repr::Type { name, .. } => name,
        }
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self.repr, other.repr) {
            (Repr::Any, Repr::Any) => true,
            (Repr::Type { type_id: a, .. }, Repr::Type { type_id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorKind({})", self.name())
    }
}

/// An ordered set of [`ErrorKind`]s, used for allow-lists and deny-lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorKinds(Vec<ErrorKind>);

impl ErrorKinds {
    /// The empty set: matches nothing.
    pub fn none() -> Self {
        ErrorKinds(Vec::new())
    }

    /// The match-all set.
    pub fn any() -> Self {
        ErrorKinds(vec![ErrorKind::Any])
    }

    /// Adds the kind for error type `E`.
    pub fn with<E>(mut self) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.insert(ErrorKind::of::<E>());
        self
    }

    /// Adds `kind`, ignoring duplicates.
    pub fn insert(&mut self, kind: ErrorKind) {
        if !self.0.contains(&kind) {
            self.0.push(kind);
        }
    }

    /// Returns `true` if any kind in the set matches `error`.
    pub fn matches(&self, error: &anyhow::Error) -> bool {
        self.0.iter().any(|kind| kind.matches(error))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorKind> {
        self.0.iter()
    }
}

impl FromIterator<ErrorKind> for ErrorKinds {
    fn from_iter<I: IntoIterator<Item = ErrorKind>>(iter: I) -> Self {
        let mut kinds = ErrorKinds::none();
        for kind in iter {
            kinds.insert(kind);
        }
        kinds
    }
}

impl From<ErrorKind> for ErrorKinds {
    fn from(kind: ErrorKind) -> Self {
        ErrorKinds(vec![kind])
    }
}

/// Error kinds to retry and error kinds to re-raise, as derived from a retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub retry: ErrorKinds,
    pub raise: ErrorKinds,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            retry: ErrorKinds::any(),
            raise: ErrorKinds::none(),
        }
    }
}
