use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random token appended to slugs.
pub const SLUG_SUFFIX_LEN: usize = 6;

/// Format `val` in lowercase base-36, left padded with '0' to `width` digits.
pub fn to_base36(mut val: u64, width: usize) -> String {
  let mut digits = Vec::with_capacity(width.max(1));
  while val > 0 {
    digits.push(BASE36_DIGITS[(val % 36) as usize]);
    val /= 36;
  }
  while digits.len() < width.max(1) {
    digits.push(b'0');
  }
  digits.reverse();
  // only ascii digits were pushed.
  String::from_utf8_lossy(&digits).into_owned()
}

/// Random base-36 token, uniform over `0..36^SLUG_SUFFIX_LEN`.
pub fn random_slug_suffix() -> String {
  let max = 36u64.pow(SLUG_SUFFIX_LEN as u32);
  let val = rand::thread_rng().gen_range(0..max);
  to_base36(val, SLUG_SUFFIX_LEN)
}

pub fn is_base36_token(token: &str, len: usize) -> bool {
  token.len() == len && token.bytes().all(|b| BASE36_DIGITS.contains(&b))
}
