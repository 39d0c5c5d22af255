use super::*;
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncReadExt, ReadBuf};

/// In-memory stand-in for an Object Storage bucket.  Object names are listed
/// in sorted order, with the last name of each page used as the continuation
/// token.
#[derive(Debug)]
pub(crate) struct FakeStore {
    objects: BTreeMap<String, Vec<u8>>,
    page_size: usize,
    empty_final_token: bool,
    fail_listing_after: Option<usize>,
    failing_heads: HashSet<String>,
    failing_gets: HashSet<String>,
    broken_bodies: HashSet<String>,
    stalled_heads: HashSet<String>,
    stalled_bodies: HashSet<String>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn new() -> FakeStore {
        FakeStore {
            objects: BTreeMap::new(),
            page_size: 1000,
            empty_final_token: false,
            fail_listing_after: None,
            failing_heads: HashSet::new(),
            failing_gets: HashSet::new(),
            broken_bodies: HashSet::new(),
            stalled_heads: HashSet::new(),
            stalled_bodies: HashSet::new(),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_object<B: Into<Vec<u8>>>(mut self, key: &str, content: B) -> FakeStore {
        self.objects.insert(key.to_owned(), content.into());
        self
    }

    pub(crate) fn with_page_size(mut self, page_size: usize) -> FakeStore {
        self.page_size = page_size;
        self
    }

    /// Return `Some("")` instead of `None` as the token on the final page
    pub(crate) fn with_empty_final_token(mut self) -> FakeStore {
        self.empty_final_token = true;
        self
    }

    /// Make every listing request after the first `pages` fail
    pub(crate) fn fail_listing_after(mut self, pages: usize) -> FakeStore {
        self.fail_listing_after = Some(pages);
        self
    }

    pub(crate) fn fail_head(mut self, key: &str) -> FakeStore {
        self.failing_heads.insert(key.to_owned());
        self
    }

    pub(crate) fn fail_get(mut self, key: &str) -> FakeStore {
        self.failing_gets.insert(key.to_owned());
        self
    }

    /// Make the content stream for `key` fail after yielding part of the
    /// object
    pub(crate) fn break_body(mut self, key: &str) -> FakeStore {
        self.broken_bodies.insert(key.to_owned());
        self
    }

    /// Make metadata requests for `key` never complete
    pub(crate) fn stall_head(mut self, key: &str) -> FakeStore {
        self.stalled_heads.insert(key.to_owned());
        self
    }

    /// Make the content stream for `key` stop making progress after yielding
    /// part of the object
    pub(crate) fn stall_body(mut self, key: &str) -> FakeStore {
        self.stalled_bodies.insert(key.to_owned());
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of times an object's content has been requested
    pub(crate) fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

impl ReportStore for FakeStore {
    async fn list_objects(
        &self,
        namespace: &str,
        bucket: &str,
        start: Option<String>,
    ) -> Result<ObjectPage, ListObjectsError> {
        let calls = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing_after.is_some_and(|n| calls >= n) {
            return Err(ListObjectsError {
                namespace: namespace.to_owned(),
                bucket: bucket.to_owned(),
                source: Box::new(SdkError::construction_failure("simulated listing failure")),
            });
        }
        let remaining = self
            .objects
            .keys()
            .filter(|k| start.as_ref().is_none_or(|s| k.as_str() > s.as_str()))
            .collect::<Vec<_>>();
        let names = remaining
            .iter()
            .take(self.page_size)
            .map(|k| (*k).clone())
            .collect::<Vec<_>>();
        let next_start = if remaining.len() > names.len() {
            names.last().cloned()
        } else if self.empty_final_token {
            Some(String::new())
        } else {
            None
        };
        Ok(ObjectPage { names, next_start })
    }

    async fn object_size(&self, object: &ObjectLocation) -> Result<u64, ObjectSizeError> {
        if self.stalled_heads.contains(object.key()) {
            std::future::pending::<()>().await;
        }
        if self.failing_heads.contains(object.key()) {
            return Err(ObjectSizeError::Head {
                object: object.clone(),
                source: Box::new(SdkError::construction_failure("simulated HEAD failure")),
            });
        }
        match self.objects.get(object.key()) {
            Some(content) => Ok(content.len() as u64),
            None => Err(ObjectSizeError::NoLength {
                object: object.clone(),
            }),
        }
    }

    async fn get_object(&self, object: &ObjectLocation) -> Result<ObjectBody, FetchObjectError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let content = match self.objects.get(object.key()) {
            Some(content) if !self.failing_gets.contains(object.key()) => content.clone(),
            _ => {
                return Err(FetchObjectError {
                    object: object.clone(),
                    source: Box::new(SdkError::construction_failure("simulated GET failure")),
                })
            }
        };
        let half = content[..content.len() / 2].to_vec();
        if self.broken_bodies.contains(object.key()) {
            Ok(Box::pin(Cursor::new(half).chain(BrokenReader)))
        } else if self.stalled_bodies.contains(object.key()) {
            Ok(Box::pin(Cursor::new(half).chain(StalledReader)))
        } else {
            Ok(Box::pin(Cursor::new(content)))
        }
    }
}

/// A reader that always fails
#[derive(Debug)]
struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset mid-transfer",
        )))
    }
}

/// A reader that never produces data
#[derive(Debug)]
struct StalledReader;

impl AsyncRead for StalledReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }
}
