//! The main database file: a contiguous, 1-based array of fixed-size
//! pages with a page size frozen by the first write (invariant I1).

use raftlite_error::{RaftliteError, Result};
use raftlite_types::{PageNumber, PageSize};

/// A main-DB page array. Page size is `None` until the first write, which
/// must carry the 100-byte database header in page 1.
#[derive(Debug, Default)]
pub struct MainDb {
    page_size: Option<PageSize>,
    pages: Vec<Vec<u8>>,
}

impl MainDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page_size(&self) -> Option<PageSize> {
        self.page_size
    }

    #[must_use]
    pub fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    /// Read a page. Reads past EOF on a non-empty file, or any read on an
    /// empty file, return `IoShort` with the destination pre-zeroed.
    pub fn read_page(&self, number: PageNumber, out: &mut [u8]) -> Result<()> {
        let index = (number.get() - 1) as usize;
        match self.pages.get(index) {
            Some(page) => {
                out.copy_from_slice(page);
                Ok(())
            }
            None => {
                out.fill(0);
                Err(RaftliteError::IoShort {
                    detail: format!("page {} is past end of file", number.get()),
                })
            }
        }
    }

    /// Write a page. The write must either replace an existing page in
    /// full or extend the file by exactly one page; any other pattern is
    /// `IoWrite`. The first write establishes the page size from bytes
    /// 16..18 of page 1's header.
    pub fn write_page(&mut self, number: PageNumber, data: &[u8]) -> Result<()> {
        let index = (number.get() - 1) as usize;

        if self.page_size.is_none() {
            if number != PageNumber::ONE {
                return Err(RaftliteError::IoWrite {
                    detail: "first write to a main database must be page 1".to_owned(),
                });
            }
            if data.len() < 18 {
                return Err(RaftliteError::IoWrite {
                    detail: "page 1 write is too short to carry the database header".to_owned(),
                });
            }
            let encoded = u16::from_be_bytes([data[16], data[17]]);
            self.page_size = Some(PageSize::decode_header_field(encoded)?);
        }

        let size = self.page_size.expect("page size set above").as_usize();
        if data.len() != size {
            return Err(RaftliteError::IoWrite {
                detail: format!("page write of {} bytes does not match page size {size}", data.len()),
            });
        }

        if index < self.pages.len() {
            self.pages[index] = data.to_vec();
            Ok(())
        } else if index == self.pages.len() {
            self.pages.push(data.to_vec());
            Ok(())
        } else {
            Err(RaftliteError::IoWrite {
                detail: format!(
                    "write to page {} would leave a gap (file has {} pages)",
                    number.get(),
                    self.pages.len()
                ),
            })
        }
    }

    /// Truncate to `page_count` pages. Must only shrink.
    pub fn truncate(&mut self, page_count: u32) -> Result<()> {
        let page_count = page_count as usize;
        if page_count > self.pages.len() {
            return Err(RaftliteError::IoTruncate {
                detail: "truncate may only shrink a main database".to_owned(),
            });
        }
        self.pages.truncate(page_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_page(page_size: u16) -> Vec<u8> {
        let mut page = vec![0_u8; 4096];
        page[16..18].copy_from_slice(&page_size.to_be_bytes());
        page
    }

    #[test]
    fn first_write_establishes_page_size() {
        let mut db = MainDb::new();
        db.write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        assert_eq!(db.page_size().unwrap().as_u32(), 4096);
    }

    #[test]
    fn first_write_must_be_page_one() {
        let mut db = MainDb::new();
        let page_two = PageNumber::new(2).unwrap();
        assert!(db.write_page(page_two, &vec![0_u8; 4096]).is_err());
    }

    #[test]
    fn extend_by_exactly_one_page_succeeds() {
        let mut db = MainDb::new();
        db.write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        let page_two = PageNumber::new(2).unwrap();
        db.write_page(page_two, &vec![7_u8; 4096]).unwrap();
        assert_eq!(db.page_count(), 2);
    }

    #[test]
    fn extend_with_a_gap_fails() {
        let mut db = MainDb::new();
        db.write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        let page_three = PageNumber::new(3).unwrap();
        assert!(db.write_page(page_three, &vec![7_u8; 4096]).is_err());
    }

    #[test]
    fn read_past_eof_zeroes_destination_and_errors() {
        let db = MainDb::new();
        let mut out = vec![1_u8; 4096];
        let err = db.read_page(PageNumber::ONE, &mut out).unwrap_err();
        assert!(matches!(err, RaftliteError::IoShort { .. }));
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn read_existing_page_round_trips() {
        let mut db = MainDb::new();
        let page = header_page(4096);
        db.write_page(PageNumber::ONE, &page).unwrap();
        let mut out = vec![0_u8; 4096];
        db.read_page(PageNumber::ONE, &mut out).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn truncate_only_shrinks() {
        let mut db = MainDb::new();
        db.write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        let page_two = PageNumber::new(2).unwrap();
        db.write_page(page_two, &vec![0_u8; 4096]).unwrap();
        assert!(db.truncate(3).is_err());
        db.truncate(1).unwrap();
        assert_eq!(db.page_count(), 1);
    }
}
