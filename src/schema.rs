// @generated — hand-maintained to match the MySQL DDL migrations under
// `migrations/`; regenerate with `diesel print-schema` after any DDL change.

diesel::table! {
    area_names (id) {
        id -> Unsigned<Smallint>,
        name -> Varchar,
    }
}

diesel::table! {
    spawnpoints (spawnpoint) {
        spawnpoint -> Unsigned<Bigint>,
        latitude -> Double,
        longitude -> Double,
    }
}

diesel::table! {
    pokestops (pokestop) {
        pokestop -> Varchar,
        pokestop_name -> Varchar,
        latitude -> Double,
        longitude -> Double,
    }
}

diesel::table! {
    gyms (gym) {
        gym -> Varchar,
        gym_name -> Varchar,
        latitude -> Double,
        longitude -> Double,
    }
}

diesel::table! {
    aggregated_pokemon_iv_monthly (spawnpoint, pokemon_id, form, iv_bucket, area_id, month_year) {
        spawnpoint -> Unsigned<Bigint>,
        pokemon_id -> Integer,
        form -> Varchar,
        iv_bucket -> Unsigned<Tinyint>,
        area_id -> Unsigned<Smallint>,
        month_year -> Unsigned<Smallint>,
        total_count -> Unsigned<Integer>,
    }
}

diesel::table! {
    shiny_username_rates (username, pokemon_id, form, shiny, area_id, month_year) {
        username -> Varchar,
        pokemon_id -> Integer,
        form -> Varchar,
        shiny -> Unsigned<Tinyint>,
        area_id -> Unsigned<Smallint>,
        month_year -> Unsigned<Smallint>,
        total_count -> Unsigned<Integer>,
    }
}

diesel::table! {
    aggregated_raids (gym, raid_pokemon, raid_level, raid_form, raid_team, raid_costume, raid_is_exclusive, raid_ex_raid_eligible, area_id, month_year) {
        gym -> Varchar,
        raid_pokemon -> Integer,
        raid_level -> Integer,
        raid_form -> Varchar,
        raid_team -> Integer,
        raid_costume -> Varchar,
        raid_is_exclusive -> Bool,
        raid_ex_raid_eligible -> Bool,
        area_id -> Unsigned<Smallint>,
        month_year -> Unsigned<Smallint>,
        total_count -> Unsigned<Integer>,
    }
}

diesel::table! {
    aggregated_invasions (pokestop, display_type, character, grunt, confirmed, area_id, month_year) {
        pokestop -> Varchar,
        display_type -> Integer,
        character -> Integer,
        grunt -> Integer,
        confirmed -> Bool,
        area_id -> Unsigned<Smallint>,
        month_year -> Unsigned<Smallint>,
        total_count -> Unsigned<Integer>,
    }
}

diesel::table! {
    pokemon_iv_daily_events (day_date, spawnpoint, pokemon_id, form, seen_at) {
        day_date -> Date,
        spawnpoint -> Unsigned<Bigint>,
        pokemon_id -> Integer,
        form -> Varchar,
        iv -> Unsigned<Tinyint>,
        area_id -> Unsigned<Smallint>,
        seen_at -> Datetime,
    }
}

diesel::table! {
    raids_daily_events (day_date, gym, seen_at) {
        day_date -> Date,
        gym -> Varchar,
        raid_pokemon -> Integer,
        raid_level -> Integer,
        raid_form -> Varchar,
        raid_team -> Integer,
        area_id -> Unsigned<Smallint>,
        seen_at -> Datetime,
    }
}

diesel::table! {
    quests_item_daily_events (day_date, pokestop, item_id, seen_at) {
        day_date -> Date,
        pokestop -> Varchar,
        mode -> Unsigned<Tinyint>,
        task_type -> Integer,
        item_id -> Integer,
        item_amount -> Integer,
        area_id -> Unsigned<Smallint>,
        seen_at -> Datetime,
    }
}

diesel::table! {
    quests_pokemon_daily_events (day_date, pokestop, poke_id, seen_at) {
        day_date -> Date,
        pokestop -> Varchar,
        mode -> Unsigned<Tinyint>,
        task_type -> Integer,
        poke_id -> Integer,
        poke_form -> Varchar,
        area_id -> Unsigned<Smallint>,
        seen_at -> Datetime,
    }
}

diesel::table! {
    invasions_daily_events (day_date, pokestop, seen_at) {
        day_date -> Date,
        pokestop -> Varchar,
        display_type -> Integer,
        character -> Integer,
        grunt -> Integer,
        confirmed -> Bool,
        area_id -> Unsigned<Smallint>,
        seen_at -> Datetime,
    }
}
