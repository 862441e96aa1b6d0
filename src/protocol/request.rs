use bytes::Bytes;

use crate::protocol::{Headers, Method};

/// An HTTP request, parameterised over its body state.
///
/// The head decoder produces a unit-bodied `Request<()>`: head parsed, body
/// still on the wire. After routing and the decoder hooks, the connection
/// materialises the body and hands the handler a `Request<Bytes>`.
#[derive(Debug)]
pub struct Request<B> {
    method: Method,
    target: String,
    headers: Headers,
    body: B,
}

impl<B> Request<B> {
    pub fn new(method: Method, target: impl Into<String>, headers: Headers, body: B) -> Self {
        Self { method, target: target.into(), headers, body }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The raw request target, exactly as it appeared on the request line.
    /// Never URL-decoded.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    /// The target with any query string stripped; this is what routing
    /// patterns match against.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The raw query string after `?`, when present.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn into_body(self) -> B {
        self.body
    }

    /// Attaches a different body, keeping the head.
    pub fn with_body<T>(self, body: T) -> Request<T> {
        Request { method: self.method, target: self.target, headers: self.headers, body }
    }

    /// A unit-bodied copy of the head, as shown to encoder hooks.
    pub fn clone_head(&self) -> Request<()> {
        Request { method: self.method, target: self.target.clone(), headers: self.headers.clone(), body: () }
    }
}

impl Request<Bytes> {
    /// The body as UTF-8 text, when it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(self.body()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_query_split_on_the_first_question_mark() {
        let req = Request::new(Method::Get, "/index/?a=1&b=2", Headers::new(), ());
        assert_eq!(req.target(), "/index/?a=1&b=2");
        assert_eq!(req.path(), "/index/");
        assert_eq!(req.query(), Some("a=1&b=2"));

        let req = Request::new(Method::Get, "/plain", Headers::new(), ());
        assert_eq!(req.path(), "/plain");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn with_body_keeps_the_head() {
        let mut headers = Headers::new();
        headers.append("Host", "localhost");
        let req = Request::new(Method::Post, "/submit", headers, ());

        let full = req.with_body(Bytes::from("data"));
        assert_eq!(full.method(), Method::Post);
        assert_eq!(full.headers().get("Host"), Some("localhost"));
        assert_eq!(full.body_str(), Some("data"));

        let head = full.clone_head();
        assert_eq!(head.target(), "/submit");
    }
}
