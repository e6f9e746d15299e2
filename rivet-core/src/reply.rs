// Conversion of handler return values into responses

use crate::{Error, HttpResponse, Json};
use serde::Serialize;

/// Values a handler method may return.
pub trait IntoReply {
    fn into_reply(self) -> Result<HttpResponse, Error>;
}

/// Empty 200
impl IntoReply for () {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::ok())
    }
}

impl IntoReply for HttpResponse {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        Ok(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::ok().with_text(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::ok().with_text(self))
    }
}

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        self.into_response()
    }
}

impl IntoReply for serde_json::Value {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        HttpResponse::ok().with_json(&self)
    }
}

/// `None` is an empty 200.
impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<HttpResponse, Error> {
        match self {
            Some(value) => value.into_reply(),
            None => Ok(HttpResponse::ok()),
        }
    }
}

macro_rules! reply_as_text {
    ($($ty:ty),+) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Result<HttpResponse, Error> {
                    Ok(HttpResponse::ok().with_text(self.to_string()))
                }
            }
        )+
    };
}

reply_as_text!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);
