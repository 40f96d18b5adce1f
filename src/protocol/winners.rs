use std::io::Cursor;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{
    DOCUMENT_LEN, FormatError, WINNERS_REQUEST_MESSAGE, check_fixed, read_u8, short_read,
};

/// Query for the winning documents of one agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnersRequest {
    pub agency: u8,
}

impl WinnersRequest {
    pub fn new(agency: u8) -> Self {
        Self { agency }
    }

    pub fn encode(&self) -> [u8; 2] {
        [WINNERS_REQUEST_MESSAGE, self.agency]
    }

    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = Cursor::new(data);
        let tag = read_u8(&mut cursor, "message type")?;
        if tag != WINNERS_REQUEST_MESSAGE {
            return Err(FormatError::UnexpectedMessage(tag));
        }
        let agency = read_u8(&mut cursor, "agency")?;
        Ok(Self { agency })
    }
}

/// Documents of the winning bettors, in the order the server sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinnersResponse {
    pub documents: Vec<String>,
}

impl WinnersResponse {
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Reads a `[count:2]{[document:8]} x count` response from the stream.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, FormatError>
    where
        R: AsyncRead + Unpin,
    {
        let mut count = [0u8; 2];
        reader
            .read_exact(&mut count)
            .await
            .map_err(|e| short_read(e, "winners count"))?;
        let count = u16::from_be_bytes(count) as usize;

        let mut documents = Vec::with_capacity(count);
        let mut document = [0u8; DOCUMENT_LEN];
        for _ in 0..count {
            reader
                .read_exact(&mut document)
                .await
                .map_err(|e| short_read(e, "winner document"))?;
            let document = std::str::from_utf8(&document)
                .map_err(|_| FormatError::InvalidUtf8("winner document"))?;
            documents.push(document.to_string());
        }

        Ok(Self { documents })
    }

    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let count = u16::try_from(self.documents.len())
            .map_err(|_| FormatError::TooManyDocuments(self.documents.len()))?;

        let mut buffer = Vec::with_capacity(2 + self.documents.len() * DOCUMENT_LEN);
        buffer.extend_from_slice(&count.to_be_bytes());
        for document in &self.documents {
            check_fixed("document", document, DOCUMENT_LEN)?;
            buffer.extend_from_slice(document.as_bytes());
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_bytes() {
        assert_eq!(WinnersRequest::new(4).encode(), [2, 4]);
        assert_eq!(WinnersRequest::decode(&[2, 4]).unwrap().agency, 4);
        assert!(matches!(
            WinnersRequest::decode(&[1, 4]),
            Err(FormatError::UnexpectedMessage(1))
        ));
        assert!(matches!(
            WinnersRequest::decode(&[2]),
            Err(FormatError::ShortRead("agency"))
        ));
    }

    #[tokio::test]
    async fn test_response_round_trip() {
        let response = WinnersResponse {
            documents: vec!["10000001".to_string(), "10000002".to_string()],
        };
        let encoded = response.encode().unwrap();
        assert_eq!(encoded.len(), 2 + 16);
        assert_eq!(&encoded[..2], &[0, 2]);

        let decoded = WinnersResponse::read_from(&mut encoded.as_slice())
            .await
            .unwrap();
        assert_eq!(decoded.count(), 2);
        assert_eq!(decoded.documents, ["10000001", "10000002"]);
    }

    #[tokio::test]
    async fn test_empty_response() {
        let decoded = WinnersResponse::read_from(&mut [0u8, 0].as_slice())
            .await
            .unwrap();
        assert_eq!(decoded, WinnersResponse::default());
    }

    #[tokio::test]
    async fn test_short_reads() {
        assert!(matches!(
            WinnersResponse::read_from(&mut [0u8].as_slice()).await,
            Err(FormatError::ShortRead("winners count"))
        ));

        // header promises two documents, body carries one and a half
        let mut data = vec![0u8, 2];
        data.extend_from_slice(b"10000001");
        data.extend_from_slice(b"1000");
        assert!(matches!(
            WinnersResponse::read_from(&mut data.as_slice()).await,
            Err(FormatError::ShortRead("winner document"))
        ));
    }

    #[test]
    fn test_encode_rejects_bad_documents() {
        let response = WinnersResponse {
            documents: vec!["123".to_string()],
        };
        assert!(matches!(
            response.encode(),
            Err(FormatError::FieldLength { len: 3, .. })
        ));
    }
}
