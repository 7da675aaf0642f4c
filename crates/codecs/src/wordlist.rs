//! Ranked word table for the dictionary codec
//!
//! Rank is the position in [`WORDS`]. Ranks below 7 cost 5 bits, ranks below
//! 70 cost 9 bits and ranks below 637 cost 13 bits, so the single letters and
//! the most frequent words come first.
//!
//! The characters `" ( ) # * ; < > $ %` never appear here; text containing
//! them is carried by the Huffman codec instead.

/// Static ranked word table
pub static WORDS: &[&str] = &[
    // 5-bit codewords
    " ", "E", "T", "A", "O", "I", "N",
    // letters, digits and punctuation
    "S", "H", "R", "D", "L", "C", "U", "M", "W", "F", "G", "Y", "P", "B", "V", "K",
    "J", "X", "Q", "Z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    ".", ",", "?", "/", "-", "+", ":", "!", "'", "@", "&", "=",
    // words and abbreviations
    "THE", "AND", "TO", "OF", "IN", "IS", "YOU", "DE", "CQ", "73", "TNX", "FB", "RST",
    "QTH", "HELLO", "WORLD", "FOR", "THAT", "IT", "WITH", "AS", "WAS", "ON", "BE",
    "AT", "BY", "THIS", "HAVE", "FROM", "OR", "ONE", "HAD", "NOT", "BUT", "WHAT",
    "ALL", "WERE", "WHEN", "WE", "THERE", "CAN", "AN", "YOUR", "WHICH", "THEIR",
    "SAID", "IF", "DO", "WILL", "EACH", "ABOUT", "HOW", "UP", "OUT", "THEM", "THEN",
    "SHE", "MANY", "SOME", "SO", "THESE", "WOULD", "OTHER", "INTO", "HAS", "MORE",
    "HER", "TWO", "LIKE", "HIM", "SEE", "TIME", "COULD", "NO", "MAKE", "THAN", "FIRST",
    "BEEN", "ITS", "WHO", "NOW", "PEOPLE", "MY", "MADE", "OVER", "DID", "DOWN", "ONLY",
    "WAY", "FIND", "USE", "MAY", "WATER", "LONG", "LITTLE", "VERY", "AFTER", "WORDS",
    "CALLED", "JUST", "WHERE", "MOST", "KNOW", "GET", "THROUGH", "BACK", "MUCH",
    "BEFORE", "GO", "GOOD", "NEW", "WRITE", "OUR", "USED", "ME", "MAN", "TOO", "ANY",
    "DAY", "SAME", "RIGHT", "LOOK", "THINK", "ALSO", "AROUND", "ANOTHER", "CAME",
    "COME", "WORK", "THREE", "WORD", "MUST", "BECAUSE", "DOES", "PART", "EVEN",
    "PLACE", "WELL", "SUCH", "HERE", "TAKE", "WHY", "THINGS", "HELP", "PUT", "YEARS",
    "DIFFERENT", "AWAY", "AGAIN", "OFF", "WENT", "OLD", "NUMBER", "GREAT", "TELL",
    "MEN", "SAY", "SMALL", "EVERY", "FOUND", "STILL", "BETWEEN", "NAME", "SHOULD",
    "HOME", "BIG", "GIVE", "AIR", "LINE", "SET", "OWN", "UNDER", "READ", "LAST",
    "NEVER", "US", "LEFT", "END", "ALONG", "WHILE", "MIGHT", "NEXT", "SOUND", "BELOW",
    "SAW", "SOMETHING", "THOUGHT", "BOTH", "FEW", "THOSE", "ALWAYS", "SHOW", "LARGE",
    "OFTEN", "TOGETHER", "ASKED", "HOUSE", "DON'T", "WORLD'S", "GOING", "WANT",
    "SCHOOL", "IMPORTANT", "UNTIL", "FORM", "FOOD", "KEEP", "CHILDREN", "FEET", "LAND",
    "SIDE", "WITHOUT", "BOY", "ONCE", "ANIMALS", "LIFE", "ENOUGH", "TOOK", "SOMETIMES",
    "FOUR", "HEAD", "ABOVE", "KIND", "BEGAN", "ALMOST", "LIVE", "PAGE", "GOT", "EARTH",
    "NEED", "FAR", "HAND", "HIGH", "YEAR", "MOTHER", "LIGHT", "PARTS", "COUNTRY",
    "FATHER", "LET", "NIGHT", "FOLLOWING", "PICTURE", "BEING", "STUDY", "SECOND",
    "EYES", "SOON", "TIMES", "STORY", "BOYS", "SINCE", "WHITE", "DAYS", "EVER",
    "PAPER", "HARD", "NEAR", "SENTENCE", "BETTER", "BEST", "ACROSS", "DURING", "TODAY",
    "OTHERS", "HOWEVER", "SURE", "MEANS", "KNEW", "IT'S", "TRY", "TOLD", "YOUNG",
    "MILES", "SUN", "WAYS", "THING", "WHOLE", "HEAR", "EXAMPLE", "HEARD", "SEVERAL",
    "CHANGE", "ANSWER", "ROOM", "SEA", "AGAINST", "TOP", "TURNED", "LEARN", "POINT",
    "CITY", "PLAY", "TOWARD", "FIVE", "USING", "HIMSELF", "USUALLY", "QSO", "QSL",
    "QSY", "QRZ", "QRM", "QRN", "QRP", "QRO", "QRT", "QSB", "QRV", "RIG", "ANT",
    "ANTENNA", "DIPOLE", "YAGI", "VERTICAL", "WATTS", "POWER", "OP", "OPERATOR", "RPT",
    "RPRT", "REPORT", "SNR", "PSE", "TU", "GM", "GA", "GE", "GN", "HW", "CPY", "COPY",
    "AGN", "BK", "KN", "SK", "AR", "CUL", "HPE", "WX", "TEMP", "SUNNY", "CLOUDY",
    "RAIN", "SNOW", "WIND", "BAND", "BANDS", "METERS", "MHZ", "KHZ", "HZ", "FREQ",
    "GRID", "LOC", "STATION", "MSG", "MSGS", "RELAY", "HEARTBEAT", "NET", "CHECK",
    "CHECKIN", "CHECKOUT", "EMERGENCY", "TRAFFIC", "SIGNAL", "STRONG", "WEAK",
    "FADING", "NOISE", "QRSS", "JS8", "FT8", "CW", "SSB", "DIGI", "MODE", "RADIO",
    "HAM", "HAMS", "AMATEUR", "CALL", "CALLS", "CALLSIGN", "DX", "CONTEST", "FIELD",
    "PORTABLE", "MOBILE", "TEST", "TESTING", "BEACON", "SPOT",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_words_are_unique() {
        let mut seen = HashSet::new();
        for word in WORDS {
            assert!(seen.insert(*word), "duplicate word {:?}", word);
        }
    }

    #[test]
    fn test_words_are_well_formed() {
        assert_eq!(WORDS[0], " ");
        for word in &WORDS[1..] {
            assert!(!word.is_empty());
            assert!(!word.contains(' '), "{:?}", word);
            assert_eq!(word.to_ascii_uppercase(), *word);
            assert!(!word.contains(|c: char| "\"()#*;<>$%".contains(c)), "{:?}", word);
        }
    }

    #[test]
    fn test_alphabet_is_covered() {
        for ch in ('A'..='Z').chain('0'..='9') {
            assert!(WORDS.contains(&ch.to_string().as_str()), "{}", ch);
        }
    }
}
