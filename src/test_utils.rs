#[cfg(test)]
#[macro_export]
macro_rules! test_for_all_curves {
    ($fn:ident) => {
        paste::paste! {
            #[test]
            fn [<$fn _p224>]() {
                $fn($crate::elliptic::curves::CurveId::P224)
            }
            #[test]
            fn [<$fn _p256>]() {
                $fn($crate::elliptic::curves::CurveId::P256)
            }
            #[test]
            fn [<$fn _p384>]() {
                $fn($crate::elliptic::curves::CurveId::P384)
            }
            #[test]
            fn [<$fn _p521>]() {
                $fn($crate::elliptic::curves::CurveId::P521)
            }
        }
    };
}
