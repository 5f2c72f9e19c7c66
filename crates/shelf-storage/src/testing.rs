//! Test record shared by the unit tests.

use bytes::BufMut;
use shelf_common::record::{get_i32, get_str, put_str};
use shelf_common::{FieldValue, Record, Result, UNASSIGNED_ID};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Show {
    pub id: i32,
    pub title: String,
    pub release_year: i32,
}

impl Show {
    pub fn new(title: &str, release_year: i32) -> Self {
        Self {
            id: UNASSIGNED_ID,
            title: title.to_string(),
            release_year,
        }
    }
}

impl Record for Show {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(10 + self.title.len());
        buf.put_i32(self.id);
        put_str(&mut buf, &self.title)?;
        buf.put_i32(self.release_year);
        Ok(buf)
    }

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            id: get_i32(&mut bytes)?,
            title: get_str(&mut bytes)?,
            release_year: get_i32(&mut bytes)?,
        })
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.into()),
            "title" => Some(self.title.as_str().into()),
            "releaseYear" => Some(self.release_year.into()),
            _ => None,
        }
    }
}
