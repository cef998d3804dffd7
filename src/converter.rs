use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

/// A request body the validator can read as raw bytes. The validator never
/// consumes the body; multipart and XML payloads are re-parsed from the
/// returned copy.
pub trait HttpBody {
    fn as_bytes(&self) -> Option<Bytes>;
}

impl HttpBody for Bytes {
    fn as_bytes(&self) -> Option<Bytes> {
        if self.is_empty() { None } else { Some(self.clone()) }
    }
}

impl HttpBody for Vec<u8> {
    fn as_bytes(&self) -> Option<Bytes> {
        if self.is_empty() { None } else { Some(Bytes::from(self.clone())) }
    }
}

impl HttpBody for String {
    fn as_bytes(&self) -> Option<Bytes> {
        if self.is_empty() { None } else { Some(Bytes::from(self.clone())) }
    }
}

impl HttpBody for &str {
    fn as_bytes(&self) -> Option<Bytes> {
        if self.is_empty() { None } else { Some(Bytes::copy_from_slice(str::as_bytes(self))) }
    }
}

impl HttpBody for () {
    fn as_bytes(&self) -> Option<Bytes> {
        None
    }
}

impl HttpBody for Value {
    fn as_bytes(&self) -> Option<Bytes> {
        if self.is_null() {
            return None;
        }
        serde_json::to_vec(self).ok().map(Bytes::from)
    }
}

impl<T: HttpBody> HttpBody for Option<T> {
    fn as_bytes(&self) -> Option<Bytes> {
        self.as_ref().and_then(HttpBody::as_bytes)
    }
}

/// Read-only view of an incoming request, implemented for `http::Request<T>`
/// out of the box so the validator slots into tower/hyper-shaped middleware
/// without copying.
pub trait HttpLike<T>
where
    T: HttpBody,
{
    fn method_ref(&self) -> &Method;
    fn path_ref(&self) -> &str;
    fn headers_ref(&self) -> &HeaderMap;
    fn query_ref(&self) -> Option<&str>;
    fn body_ref(&self) -> &T;
}

impl<T> HttpLike<T> for http::Request<T>
where
    T: HttpBody,
{
    fn method_ref(&self) -> &Method {
        self.method()
    }

    fn path_ref(&self) -> &str {
        self.uri().path()
    }

    fn headers_ref(&self) -> &HeaderMap {
        self.headers()
    }

    fn query_ref(&self) -> Option<&str> {
        self.uri().query()
    }

    fn body_ref(&self) -> &T {
        self.body()
    }
}

/// Read-only view of an outgoing response, for response validation.
pub trait HttpResponseLike<T>
where
    T: HttpBody,
{
    fn status_ref(&self) -> StatusCode;
    fn headers_ref(&self) -> &HeaderMap;
    fn body_ref(&self) -> &T;
}

impl<T> HttpResponseLike<T> for http::Response<T>
where
    T: HttpBody,
{
    fn status_ref(&self) -> StatusCode {
        self.status()
    }

    fn headers_ref(&self) -> &HeaderMap {
        self.headers()
    }

    fn body_ref(&self) -> &T {
        self.body()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_adapter() {
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("https://example.com/pets?limit=10")
            .header("content-type", "application/json")
            .body(json!({"name": "Ruby"}))
            .unwrap();

        assert_eq!(request.path_ref(), "/pets");
        assert_eq!(request.query_ref(), Some("limit=10"));
        assert!(request.body_ref().as_bytes().is_some());
    }

    #[test]
    fn test_empty_bodies_read_as_none() {
        assert!(().as_bytes().is_none());
        assert!(HttpBody::as_bytes(&String::new()).is_none());
        assert!(Value::Null.as_bytes().is_none());
        assert!(Bytes::new().as_bytes().is_none());
        assert!(Option::<String>::None.as_bytes().is_none());
    }
}
