use std::fmt::{self, Display, Formatter};

use serde::{Serialize, Serializer};

use crate::PathSegment;

/// A segment of the path currently being resolved, borrowing from the
/// executed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPathSegment<'a> {
    /// A list index.
    Index(usize),
    /// A field response name.
    Name(&'a str),
}

impl QueryPathSegment<'_> {
    pub fn to_path_segment(self) -> PathSegment {
        match self {
            QueryPathSegment::Name(name) => PathSegment::Field(name.to_string()),
            QueryPathSegment::Index(index) => PathSegment::Index(index),
        }
    }
}

/// One node of the path being resolved.
///
/// Nodes form a chain of borrows up the resolution stack: a path is only ever
/// extended by creating a new node that points at its parent, never by
/// mutation. `type_name` records the object type that declared the field the
/// segment belongs to.
#[derive(Debug, Clone, Copy)]
pub struct QueryPathNode<'a> {
    /// The parent node to this, if there is one.
    pub parent: Option<&'a QueryPathNode<'a>>,

    /// The current path segment being resolved.
    pub segment: QueryPathSegment<'a>,

    /// The object type declaring the field this segment belongs to, if the
    /// segment is a field name.
    pub type_name: Option<&'a str>,
}

impl<'a> QueryPathNode<'a> {
    /// Iterate over the segments, root first.
    pub fn iter(&self) -> impl Iterator<Item = &QueryPathSegment<'a>> + '_ {
        let mut segments = Vec::new();
        let mut node = Some(self);
        while let Some(current) = node {
            segments.push(&current.segment);
            node = current.parent;
        }
        segments.reverse();
        segments.into_iter()
    }

    /// Collect the chain into owned segments, root first.
    pub fn to_path(&self) -> Vec<PathSegment> {
        self.iter().map(|segment| segment.to_path_segment()).collect()
    }
}

impl Display for QueryPathNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.iter().enumerate() {
            if idx != 0 {
                write!(f, ".")?;
            }
            match segment {
                QueryPathSegment::Index(index) => write!(f, "{index}")?,
                QueryPathSegment::Name(name) => write!(f, "{name}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for QueryPathNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|segment| segment.to_path_segment()))
    }
}
