pub trait SortField: Copy {
    fn parse(name: &str) -> Option<Self>;
    fn column(&self) -> &'static str;
}

// `?ordering=field` sorts ascending, `?ordering=-field` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder<F> {
    pub field: F,
    pub descending: bool,
}

impl<F: SortField> SortOrder<F> {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (descending, name) = match raw.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, raw),
        };
        F::parse(name).map(|field| SortOrder { field, descending })
    }

    pub fn to_sql(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {direction}", self.field.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSort {
    PricePerNight,
    CreatedAt,
    UpdatedAt,
}

impl SortField for ListingSort {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "price_per_night" => Some(ListingSort::PricePerNight),
            "created_at" => Some(ListingSort::CreatedAt),
            "updated_at" => Some(ListingSort::UpdatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            // Prices are stored as decimal text
            ListingSort::PricePerNight => "CAST(price_per_night AS REAL)",
            ListingSort::CreatedAt => "created_at",
            ListingSort::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingSort {
    CheckIn,
    CheckOut,
    CreatedAt,
}

impl SortField for BookingSort {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "check_in" => Some(BookingSort::CheckIn),
            "check_out" => Some(BookingSort::CheckOut),
            "created_at" => Some(BookingSort::CreatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            BookingSort::CheckIn => "check_in",
            BookingSort::CheckOut => "check_out",
            BookingSort::CreatedAt => "created_at",
        }
    }
}

pub type ListingOrder = SortOrder<ListingSort>;
pub type BookingOrder = SortOrder<BookingSort>;
