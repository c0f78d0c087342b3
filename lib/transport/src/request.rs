use http::{request::Parts, HeaderMap, HeaderName, Method, Request};

/// The parts of an incoming HTTP request the transport needs to look at.
///
/// Host adapters implement this for their own request type; the `http` crate's
/// request types are covered here.
pub trait RequestLike {
    fn method(&self) -> &Method;
    fn headers(&self) -> &HeaderMap;
    /// Raw query string, without the leading `?`.
    fn query_string(&self) -> Option<&str>;

    fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }
}

impl<B> RequestLike for Request<B> {
    fn method(&self) -> &Method {
        self.method()
    }

    fn headers(&self) -> &HeaderMap {
        self.headers()
    }

    fn query_string(&self) -> Option<&str> {
        self.uri().query()
    }
}

impl RequestLike for Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }
}
