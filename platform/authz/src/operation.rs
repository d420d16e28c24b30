use http::Method;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

/// What the caller wants to do with a resource.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write(WriteKind),
}

impl Operation {
    pub const CREATE: Operation = Operation::Write(WriteKind::Create);
    pub const UPDATE: Operation = Operation::Write(WriteKind::Update);
    pub const DELETE: Operation = Operation::Write(WriteKind::Delete);

    /// Safe methods read; everything else writes.
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Operation::Read,
            Method::POST => Operation::CREATE,
            Method::DELETE => Operation::DELETE,
            _ => Operation::UPDATE,
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, Operation::Read)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write(WriteKind::Create) => "create",
            Operation::Write(WriteKind::Update) => "update",
            Operation::Write(WriteKind::Delete) => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_methods_map_to_operation_classes() {
        assert_eq!(Operation::from_method(&Method::GET), Operation::Read);
        assert_eq!(Operation::from_method(&Method::HEAD), Operation::Read);
        assert_eq!(Operation::from_method(&Method::OPTIONS), Operation::Read);
        assert_eq!(Operation::from_method(&Method::POST), Operation::CREATE);
        assert_eq!(Operation::from_method(&Method::PUT), Operation::UPDATE);
        assert_eq!(Operation::from_method(&Method::PATCH), Operation::UPDATE);
        assert_eq!(Operation::from_method(&Method::DELETE), Operation::DELETE);
    }
}
