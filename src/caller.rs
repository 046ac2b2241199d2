use std::fmt;

/// Identity of a reader task. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub u32);

/// Identity of a writer task. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriterId(pub u32);

impl fmt::Display for ReaderId
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "reader[{}]", self.0)
    }
}

impl fmt::Display for WriterId
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "writer[{}]", self.0)
    }
}
