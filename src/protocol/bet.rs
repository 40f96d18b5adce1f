use std::io::{Cursor, Read};

use super::{
    BET_BATCH_MESSAGE, BIRTHDATE_LEN, DOCUMENT_LEN, FormatError, MAX_BATCH_LEN, check_fixed,
    read_exact, read_string, read_u8, read_u16,
};

/// Fixed part of a bet payload: agency, two length bytes, document,
/// birth date and number.
const FIXED_PAYLOAD_LEN: usize = 1 + 1 + 1 + DOCUMENT_LEN + BIRTHDATE_LEN + 2;

/// A single betting record as sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub agency: u8,
    pub first_name: String,
    pub last_name: String,
    /// National identifier, exactly 8 bytes.
    pub document: String,
    /// `YYYY-MM-DD`, exactly 10 bytes.
    pub birthdate: String,
    pub number: u16,
}

impl Bet {
    /// Length of the payload that follows the 2-byte frame length.
    pub fn payload_len(&self) -> usize {
        FIXED_PAYLOAD_LEN + self.first_name.len() + self.last_name.len()
    }

    /// Checks every field fits the wire layout.
    pub fn validate(&self) -> Result<(), FormatError> {
        for (field, value) in [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
        ] {
            if value.len() > u8::MAX as usize {
                return Err(FormatError::FieldTooLong {
                    field,
                    len: value.len(),
                });
            }
        }
        check_fixed("document", &self.document, DOCUMENT_LEN)?;
        check_fixed("birth date", &self.birthdate, BIRTHDATE_LEN)?;
        Ok(())
    }

    /// Encodes the bet as a length-prefixed frame.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let mut buffer = Vec::with_capacity(2 + self.payload_len());
        self.write_frame(&mut buffer)?;
        Ok(buffer)
    }

    /// Appends the length-prefixed frame to `buffer`. Nothing is written if
    /// the bet does not fit the wire layout.
    pub fn write_frame(&self, buffer: &mut Vec<u8>) -> Result<(), FormatError> {
        self.validate()?;

        // Bounded by 2 * 255 + FIXED_PAYLOAD_LEN, always fits a u16.
        let payload_len = self.payload_len() as u16;
        buffer.extend_from_slice(&payload_len.to_be_bytes());
        buffer.push(self.agency);
        buffer.push(self.first_name.len() as u8);
        buffer.extend_from_slice(self.first_name.as_bytes());
        buffer.push(self.last_name.len() as u8);
        buffer.extend_from_slice(self.last_name.as_bytes());
        buffer.extend_from_slice(self.document.as_bytes());
        buffer.extend_from_slice(self.birthdate.as_bytes());
        buffer.extend_from_slice(&self.number.to_be_bytes());
        Ok(())
    }

    /// Reads one length-prefixed frame.
    pub fn read_frame(reader: &mut impl Read) -> Result<Self, FormatError> {
        let declared = read_u16(reader, "bet frame length")? as usize;
        let mut payload = vec![0u8; declared];
        read_exact(reader, &mut payload, "bet frame")?;
        Self::decode_payload(&payload)
    }

    /// Decodes the payload of a frame, i.e. everything after the 2-byte
    /// length. The payload must be consumed exactly.
    pub fn decode_payload(payload: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = Cursor::new(payload);

        let agency = read_u8(&mut cursor, "agency")?;
        let name_len = read_u8(&mut cursor, "first name length")? as usize;
        let first_name = read_string(&mut cursor, name_len, "first name")?;
        let surname_len = read_u8(&mut cursor, "last name length")? as usize;
        let last_name = read_string(&mut cursor, surname_len, "last name")?;
        let document = read_string(&mut cursor, DOCUMENT_LEN, "document")?;
        let birthdate = read_string(&mut cursor, BIRTHDATE_LEN, "birth date")?;
        let number = read_u16(&mut cursor, "number")?;

        let bet = Bet {
            agency,
            first_name,
            last_name,
            document,
            birthdate,
            number,
        };
        if bet.payload_len() != payload.len() {
            return Err(FormatError::FrameLength {
                declared: payload.len(),
                actual: bet.payload_len(),
            });
        }
        Ok(bet)
    }
}

/// Serializes a batch submission: message tag, bet count, then one frame per
/// bet in order.
pub fn encode_batch(bets: &[Bet]) -> Result<Vec<u8>, FormatError> {
    if bets.is_empty() {
        return Err(FormatError::EmptyBatch);
    }
    if bets.len() > MAX_BATCH_LEN {
        return Err(FormatError::BatchTooLarge(bets.len()));
    }

    let size = 2 + bets.iter().map(|b| 2 + b.payload_len()).sum::<usize>();
    let mut buffer = Vec::with_capacity(size);
    buffer.push(BET_BATCH_MESSAGE);
    buffer.push(bets.len() as u8);
    for bet in bets {
        bet.write_frame(&mut buffer)?;
    }
    Ok(buffer)
}

/// Reads the bet count and frames that follow a batch tag.
fn read_batch_body(reader: &mut impl Read) -> Result<Vec<Bet>, FormatError> {
    let count = read_u8(reader, "bet count")? as usize;
    let mut bets = Vec::with_capacity(count);
    for _ in 0..count {
        bets.push(Bet::read_frame(reader)?);
    }
    Ok(bets)
}

/// Inverse of [`encode_batch`].
pub fn decode_batch(data: &[u8]) -> Result<Vec<Bet>, FormatError> {
    let mut cursor = Cursor::new(data);
    let tag = read_u8(&mut cursor, "message type")?;
    if tag != BET_BATCH_MESSAGE {
        return Err(FormatError::UnexpectedMessage(tag));
    }
    read_batch_body(&mut cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_bet(agency: u8, number: u16) -> Bet {
        Bet {
            agency,
            first_name: "Santiago Lionel".to_string(),
            last_name: "Lorca".to_string(),
            document: "30904465".to_string(),
            birthdate: "1999-03-17".to_string(),
            number,
        }
    }

    #[test]
    fn test_bet_frame_layout() {
        let bet = sample_bet(1, 7574);
        let frame = bet.encode().unwrap();

        let payload_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(payload_len, frame.len() - 2);
        assert_eq!(payload_len, 1 + 1 + 15 + 1 + 5 + 8 + 10 + 2);

        assert_eq!(frame[2], 1); // agency
        assert_eq!(frame[3], 15); // first name length
        assert_eq!(&frame[4..19], b"Santiago Lionel");
        assert_eq!(frame[19], 5); // last name length
        assert_eq!(&frame[20..25], b"Lorca");
        assert_eq!(&frame[25..33], b"30904465");
        assert_eq!(&frame[33..43], b"1999-03-17");
        assert_eq!(&frame[43..], &7574u16.to_be_bytes());
    }

    #[test]
    fn test_batch_framing() {
        let bets: Vec<Bet> = (0..4).map(|i| sample_bet(3, i)).collect();
        let encoded = encode_batch(&bets).unwrap();

        assert_eq!(encoded[0], BET_BATCH_MESSAGE);
        assert_eq!(encoded[1], 4);
        let expected = 2 + bets.iter().map(|b| 2 + b.payload_len()).sum::<usize>();
        assert_eq!(encoded.len(), expected);

        assert_eq!(decode_batch(&encoded).unwrap(), bets);
    }

    #[test]
    fn test_batch_limits() {
        assert!(matches!(encode_batch(&[]), Err(FormatError::EmptyBatch)));

        let bets = vec![sample_bet(1, 1); 256];
        assert!(matches!(
            encode_batch(&bets),
            Err(FormatError::BatchTooLarge(256))
        ));
        assert_eq!(encode_batch(&bets[..255]).unwrap()[1], 255);
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let mut bet = sample_bet(1, 1);
        bet.document = "1234567".to_string();
        assert!(matches!(
            bet.encode(),
            Err(FormatError::FieldLength {
                field: "document",
                expected: 8,
                len: 7
            })
        ));

        let mut bet = sample_bet(1, 1);
        bet.birthdate = "1999-3-17".to_string();
        assert!(matches!(
            bet.encode(),
            Err(FormatError::FieldLength { field: "birth date", .. })
        ));

        let mut bet = sample_bet(1, 1);
        bet.last_name = "x".repeat(256);
        assert!(matches!(
            bet.encode(),
            Err(FormatError::FieldTooLong { len: 256, .. })
        ));

        // an invalid bet in the middle must fail the whole batch
        let mut bets = vec![sample_bet(1, 1); 3];
        bets[1].document.push('9');
        assert!(encode_batch(&bets).is_err());
    }

    #[test]
    fn test_decode_truncated_and_inconsistent_frames() {
        let frame = sample_bet(2, 42).encode().unwrap();
        let truncated = &frame[..frame.len() - 1];
        assert!(matches!(
            Bet::read_frame(&mut Cursor::new(truncated)),
            Err(FormatError::ShortRead("bet frame"))
        ));

        // frame length one byte longer than the fields need
        let mut padded = frame.clone();
        let declared = u16::from_be_bytes([frame[0], frame[1]]) + 1;
        padded[..2].copy_from_slice(&declared.to_be_bytes());
        padded.push(0);
        assert!(matches!(
            Bet::read_frame(&mut Cursor::new(&padded)),
            Err(FormatError::FrameLength { .. })
        ));

        assert!(matches!(
            decode_batch(&[2, 1]),
            Err(FormatError::UnexpectedMessage(2))
        ));
    }

    fn any_bet() -> impl Strategy<Value = Bet> {
        (
            any::<u8>(),
            "\\PC{0,60}",
            "[a-zA-Z ]{0,255}",
            "[0-9]{8}",
            "[0-9]{4}-[0-9]{2}-[0-9]{2}",
            any::<u16>(),
        )
            .prop_filter("names must fit one length byte", |(_, name, ..)| {
                name.len() <= 255
            })
            .prop_map(
                |(agency, first_name, last_name, document, birthdate, number)| Bet {
                    agency,
                    first_name,
                    last_name,
                    document,
                    birthdate,
                    number,
                },
            )
    }

    proptest! {
        #[test]
        fn bet_round_trips(bet in any_bet()) {
            let frame = bet.encode().unwrap();
            let decoded = Bet::read_frame(&mut Cursor::new(&frame)).unwrap();
            prop_assert_eq!(decoded, bet);
        }
    }
}
