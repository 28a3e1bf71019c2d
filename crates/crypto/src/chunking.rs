/// Split `text` into pieces of at most `max_bytes` bytes, never inside a
/// UTF-8 character. Concatenating the pieces gives back `text`.
///
/// `max_bytes` must be at least 4 so that any character fits; smaller values
/// are raised to 4.
#[must_use]
pub fn split_utf8(text: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(stagecrypt_core::MIN_CHUNK_SIZE);
    let mut chunks = Vec::with_capacity(text.len() / max_bytes + 1);
    let mut rest = text;

    while !rest.is_empty() {
        let mut end = rest.len().min(max_bytes);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(split_utf8("", 4096).is_empty());
    }

    #[test]
    fn test_exact_multiple() {
        let chunks = split_utf8("abcdefgh", 4);
        assert_eq!(chunks, ["abcd", "efgh"]);
    }

    #[test]
    fn test_multibyte_characters_stay_whole() {
        // each 'é' is two bytes, '€' is three
        let text = "éé€é";
        let chunks = split_utf8(text, 4);
        assert_eq!(chunks, ["éé", "€", "é"]);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 4));
    }

    #[test]
    fn test_ten_kilobytes_in_three_kilobyte_chunks() {
        let text = "x".repeat(10 * 1024);
        let chunks = split_utf8(&text, 3 * 1024);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].len(), 1024);
    }

    proptest! {
        #[test]
        fn prop_chunks_concatenate_to_input(text in ".{0,300}", size in 4usize..64) {
            let chunks = split_utf8(&text, size);
            prop_assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= size));
            prop_assert_eq!(chunks.concat(), text);
        }
    }
}
