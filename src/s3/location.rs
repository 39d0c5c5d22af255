use std::fmt;

/// The location of an object in OCI Object Storage
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct ObjectLocation {
    /// The Object Storage namespace
    namespace: String,

    /// The bucket name
    bucket: String,

    /// The object name
    key: String,
}

impl ObjectLocation {
    /// Construct a new `ObjectLocation` for the given namespace, bucket, &
    /// object name
    pub(crate) fn new(namespace: String, bucket: String, key: String) -> ObjectLocation {
        ObjectLocation {
            namespace,
            bucket,
            key,
        }
    }

    /// Returns the bucket name
    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the full object name
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Returns the final forward-slash-separated component of the object
    /// name
    pub(crate) fn name(&self) -> &str {
        match self.key.rsplit_once('/') {
            Some((_, post)) => post,
            None => &self.key,
        }
    }
}

impl fmt::Display for ObjectLocation {
    /// Format an `ObjectLocation` as an `oci://` URI
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oci://{}@{}/{}", self.bucket, self.namespace, self.key)
    }
}
